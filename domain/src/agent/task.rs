//! One unit of review work.

use super::config::AgentConfig;
use std::sync::Arc;

/// One (agent, pass) unit of work, consumed exactly once by an executor.
#[derive(Debug, Clone)]
pub struct AgentTask {
    agent: Arc<AgentConfig>,
    pass: u32,
}

impl AgentTask {
    pub fn new(agent: Arc<AgentConfig>, pass: u32) -> Self {
        Self { agent, pass }
    }

    /// Expand agents × passes into tasks, agent-major and passes from 1.
    pub fn expand(agents: &[Arc<AgentConfig>], passes: u32) -> Vec<AgentTask> {
        agents
            .iter()
            .flat_map(|agent| (1..=passes).map(move |pass| AgentTask::new(Arc::clone(agent), pass)))
            .collect()
    }

    pub fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    pub fn pass(&self) -> u32 {
        self.pass
    }
}

impl std::fmt::Display for AgentTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (pass {})", self.agent.display_name(), self.pass)
    }
}
