//! Agent definition directories from TOML (`[agents]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where agent definitions and shared skills are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentsConfig {
    /// Directories searched for agent definition files, in order.
    /// Later directories override earlier ones on name clashes.
    pub directories: Vec<PathBuf>,
    /// Root of shared skills, one `<id>/SKILL.md` per skill
    pub skills_directory: Option<PathBuf>,
}

impl Default for FileAgentsConfig {
    fn default() -> Self {
        Self {
            directories: vec![PathBuf::from("agents"), PathBuf::from(".github/agents")],
            skills_directory: Some(PathBuf::from(".github/skills")),
        }
    }
}
