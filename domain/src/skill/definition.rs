//! Skill definitions and prompt rendering
//!
//! The prompt body references parameters as `${name}`. Rendering fills
//! every declared parameter from the supplied values or its default; a
//! required parameter without a value is an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use thiserror::Error;

/// Metadata key that restricts a shared skill to one agent.
pub const SKILL_AGENT_METADATA_KEY: &str = "agent";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_.-]+)\}").expect("placeholder pattern is valid")
});

/// Errors raised while rendering a skill prompt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkillError {
    #[error("Missing required parameter(s) for skill '{skill}': {}", .missing.join(", "))]
    MissingParameters { skill: String, missing: Vec<String> },
}

/// One declared skill parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillParameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Free-form type hint shown in listings (`string` by default)
    #[serde(default = "default_parameter_type", rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
}

fn default_parameter_type() -> String {
    "string".to_string()
}

impl SkillParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind: default_parameter_type(),
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A parameterized prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// Directory name (`SKILL.md`) or file name without `.skill.md`
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
    #[serde(default)]
    pub parameters: Vec<SkillParameter>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SkillDefinition {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            prompt: prompt.into(),
            parameters: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameter(mut self, parameter: SkillParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Agent this skill is restricted to, if any.
    pub fn agent(&self) -> Option<&str> {
        self.metadata
            .get(SKILL_AGENT_METADATA_KEY)
            .map(String::as_str)
            .filter(|agent| !agent.trim().is_empty())
    }

    /// Whether this skill may be attached to `agent_name`.
    pub fn applies_to(&self, agent_name: &str) -> bool {
        self.agent().is_none_or(|agent| agent == agent_name)
    }

    /// Prompt with every `${name}` placeholder filled.
    ///
    /// Values for undeclared names are substituted too. Placeholders with no
    /// value and no default are left untouched.
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, SkillError> {
        let missing: Vec<String> = self
            .parameters
            .iter()
            .filter(|p| p.required && p.default.is_none())
            .filter(|p| values.get(&p.name).is_none_or(|v| v.trim().is_empty()))
            .map(|p| p.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(SkillError::MissingParameters {
                skill: self.id.clone(),
                missing,
            });
        }

        let rendered = PLACEHOLDER.replace_all(&self.prompt, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            values
                .get(name)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .or_else(|| {
                    self.parameters
                        .iter()
                        .find(|p| p.name == name)
                        .and_then(|p| p.default.clone())
                })
                .unwrap_or_else(|| caps[0].to_string())
        });
        Ok(rendered.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audit_skill() -> SkillDefinition {
        SkillDefinition::new("dependency-audit", "Audit ${repository} on branch ${branch}.")
            .with_parameter(SkillParameter::new("repository").required())
            .with_parameter(SkillParameter::new("branch").with_default("main"))
    }

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_fills_values_and_defaults() {
        let skill = audit_skill();
        assert_eq!(
            skill.render(&values(&[("repository", "octo/service")])).unwrap(),
            "Audit octo/service on branch main."
        );
        assert_eq!(
            skill
                .render(&values(&[("repository", "octo/service"), ("branch", "dev")]))
                .unwrap(),
            "Audit octo/service on branch dev."
        );
    }

    #[test]
    fn test_render_reports_missing_required_parameters() {
        let err = audit_skill().render(&values(&[("repository", "  ")])).unwrap_err();
        assert_eq!(
            err,
            SkillError::MissingParameters {
                skill: "dependency-audit".into(),
                missing: vec!["repository".into()],
            }
        );
        assert!(err.to_string().contains("repository"));
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let skill = SkillDefinition::new("raw", "Keep ${unknown} and use ${extra}.");
        assert_eq!(
            skill.render(&values(&[("extra", "this")])).unwrap(),
            "Keep ${unknown} and use this."
        );
    }

    #[test]
    fn test_agent_restriction() {
        let shared = SkillDefinition::new("shared", "p");
        assert!(shared.applies_to("security"));

        let scoped = SkillDefinition::new("scoped", "p").with_metadata("agent", "security");
        assert_eq!(scoped.agent(), Some("security"));
        assert!(scoped.applies_to("security"));
        assert!(!scoped.applies_to("performance"));
    }

    #[test]
    fn test_parameter_type_defaults_to_string() {
        let parameter: SkillParameter = serde_json::from_str(r#"{"name":"repository"}"#).unwrap();
        assert_eq!(parameter.kind, "string");
        assert!(!parameter.required);
    }
}
