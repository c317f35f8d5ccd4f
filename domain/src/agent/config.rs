//! Review agent configuration.
//!
//! An agent is a named review perspective: a model, a system prompt and the
//! focus areas it is restricted to. Definitions are loaded from agent files
//! by the infrastructure layer and shared read-only across all passes.

use crate::core::error::DomainError;
use crate::core::model::Model;
use crate::prompt::ReviewPromptTemplate;
use crate::skill::SkillDefinition;
use crate::target::ReviewTarget;
use serde::{Deserialize, Serialize};

/// Identity of the agent that produced a result.
///
/// Results are grouped by [`name`](Self::name) when passes are merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub name: String,
    pub display_name: String,
}

impl AgentIdentity {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
        }
    }
}

impl std::fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

/// Configuration of one review agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent name (file stem of the definition by default)
    #[serde(default)]
    pub name: String,
    /// Name shown in reports; falls back to `name` when empty
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub model: Model,
    pub system_prompt: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    /// Optional instruction template; `{target}` is replaced with the
    /// repository or directory name.
    #[serde(default)]
    pub instruction: Option<String>,
    /// Skills attached by the loader
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<SkillDefinition>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            model: Model::default(),
            system_prompt: system_prompt.into(),
            focus_areas: Vec::new(),
            instruction: None,
            skills: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    pub fn with_focus_areas(mut self, focus_areas: Vec<String>) -> Self {
        self.focus_areas = focus_areas;
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_skills(mut self, skills: Vec<SkillDefinition>) -> Self {
        self.skills = skills;
        self
    }

    pub fn skill(&self, id: &str) -> Option<&SkillDefinition> {
        self.skills.iter().find(|s| s.id == id)
    }

    /// Name shown to users, never empty for a valid agent.
    pub fn display_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    pub fn identity(&self) -> AgentIdentity {
        AgentIdentity::new(self.name.clone(), self.display_name())
    }

    /// Reject definitions that cannot drive a session.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidAgent("agent name is empty".to_string()));
        }
        if self.system_prompt.trim().is_empty() {
            return Err(DomainError::InvalidAgent(format!(
                "agent '{}' has an empty system prompt",
                self.name
            )));
        }
        if self.model.as_str().trim().is_empty() {
            return Err(DomainError::InvalidAgent(format!(
                "agent '{}' has an empty model",
                self.name
            )));
        }
        Ok(())
    }

    /// System prompt including focus areas, the output format and any extra
    /// instructions.
    pub fn build_system_prompt(
        &self,
        output_constraints: Option<&str>,
        custom_instructions: &[String],
    ) -> String {
        ReviewPromptTemplate::system_prompt(
            &self.system_prompt,
            &self.focus_areas,
            output_constraints,
            custom_instructions,
        )
    }

    /// Instruction sent as the user message of the review exchange.
    ///
    /// Local targets embed `source` (the pre-collected file contents).
    pub fn build_instruction(&self, target: &ReviewTarget, source: Option<&str>) -> String {
        let name = target.display_name();
        let custom = self
            .instruction
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| ReviewPromptTemplate::render_custom(t, &name));

        match target {
            ReviewTarget::Remote { repository } => {
                custom.unwrap_or_else(|| ReviewPromptTemplate::remote_instruction(repository))
            }
            ReviewTarget::Local { .. } => {
                let base = ReviewPromptTemplate::local_instruction(&name, source.unwrap_or_default());
                match custom {
                    Some(custom) => format!("{}\n\n{}", custom, base),
                    None => base,
                }
            }
        }
    }
}
