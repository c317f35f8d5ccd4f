//! Output configuration from TOML (`[output]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw output configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// Directory reports are written to
    pub directory: PathBuf,
    /// Extra constraints appended to every system prompt (language, tone)
    pub constraints: Option<String>,
    /// Files whose contents are appended to every system prompt
    pub instruction_files: Vec<PathBuf>,
    /// Append `.github/prompts/*.prompt.md` of the reviewed directory
    pub prompt_files: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("reports"),
            constraints: None,
            instruction_files: Vec::new(),
            prompt_files: true,
        }
    }
}
