//! Run skill use case
//!
//! A skill runs as one exchange in its own session, outside any review run.
//! The session uses the system prompt and model of the agent the skill is
//! attached to; the prompt is the skill body with its parameters filled.

use crate::config::SESSION_CLOSE_TIMEOUT;
use crate::ports::session_gateway::{GatewayError, McpServers, SessionConfig, SessionGateway};
use reviewer_domain::{AgentConfig, Model, SkillDefinition, SkillError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default limit for one skill exchange.
pub const DEFAULT_SKILL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Errors from running a skill
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunSkillError {
    #[error("Skill not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Parameters(#[from] SkillError),

    #[error("Skill execution timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Skill execution failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Skill returned empty content")]
    EmptyContent,
}

/// A skill together with the agent it runs as.
#[derive(Debug, Clone)]
pub struct SkillEntry {
    pub skill: SkillDefinition,
    pub agent: AgentConfig,
}

/// Every skill of a set of agents, keyed by skill id.
///
/// A shared skill attached to several agents is registered once, for the
/// first agent that carries it.
#[derive(Debug, Clone, Default)]
pub struct SkillCatalog {
    entries: BTreeMap<String, SkillEntry>,
}

impl SkillCatalog {
    pub fn from_agents<'a>(agents: impl IntoIterator<Item = &'a AgentConfig>) -> Self {
        let mut entries: BTreeMap<String, SkillEntry> = BTreeMap::new();
        for agent in agents {
            for skill in &agent.skills {
                if let Some(existing) = entries.get(&skill.id) {
                    debug!(
                        "Skill {} already registered for agent {}, ignoring the copy on {}",
                        skill.id, existing.agent.name, agent.name
                    );
                    continue;
                }
                let mut owner = agent.clone();
                owner.skills.clear();
                entries.insert(
                    skill.id.clone(),
                    SkillEntry {
                        skill: skill.clone(),
                        agent: owner,
                    },
                );
            }
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&SkillEntry> {
        self.entries.get(id)
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SkillEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Input for one skill run
#[derive(Debug, Clone)]
pub struct RunSkillInput {
    pub skill_id: String,
    pub parameters: HashMap<String, String>,
    /// Replaces the agent's model when set
    pub model: Option<Model>,
}

impl RunSkillInput {
    pub fn new(skill_id: impl Into<String>) -> Self {
        Self {
            skill_id: skill_id.into(),
            parameters: HashMap::new(),
            model: None,
        }
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }
}

pub struct RunSkillUseCase<G: SessionGateway + 'static> {
    gateway: Arc<G>,
    timeout: Duration,
    mcp_servers: Option<McpServers>,
    reasoning_effort: Option<String>,
}

impl<G: SessionGateway + 'static> RunSkillUseCase<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            timeout: DEFAULT_SKILL_TIMEOUT,
            mcp_servers: None,
            reasoning_effort: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_mcp_servers(mut self, servers: McpServers) -> Self {
        self.mcp_servers = Some(servers);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: Option<String>) -> Self {
        self.reasoning_effort = effort;
        self
    }

    /// Run one skill from `catalog` and return the model's answer.
    pub async fn execute(&self, catalog: &SkillCatalog, input: RunSkillInput) -> Result<String, RunSkillError> {
        let entry = catalog
            .get(&input.skill_id)
            .ok_or_else(|| RunSkillError::NotFound(input.skill_id.clone()))?;
        let prompt = entry.skill.render(&input.parameters)?;

        let model = input.model.unwrap_or_else(|| entry.agent.model.clone());
        let mut config = SessionConfig::new(model.clone(), entry.agent.system_prompt.clone());
        if let Some(servers) = &self.mcp_servers {
            config = config.with_mcp_servers(Arc::clone(servers));
        }
        if let Some(effort) = model.reasoning_effort(self.reasoning_effort.as_deref()) {
            config = config.with_reasoning_effort(effort);
        }

        info!("Running skill {} as agent {} ({})", entry.skill.id, entry.agent.name, model);
        let deadline = Instant::now() + self.timeout;
        let session = match tokio::time::timeout_at(deadline, self.gateway.open(&config)).await {
            Ok(session) => session?,
            Err(_) => return Err(RunSkillError::Timeout(self.timeout)),
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let outcome = session.send_and_await(&prompt, remaining).await;

        match tokio::time::timeout(SESSION_CLOSE_TIMEOUT, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Failed to close skill session: {}", e),
            Err(_) => debug!("Timed out closing skill session"),
        }

        let content = match outcome {
            Ok(content) => content,
            Err(GatewayError::Timeout) => return Err(RunSkillError::Timeout(self.timeout)),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Err(RunSkillError::EmptyContent);
        }
        Ok(content)
    }
}
