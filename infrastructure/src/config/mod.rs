//! Configuration file loading for multi-reviewer
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. Environment variables prefixed with `REVIEWER_` (`__` separates sections)
//! 2. `--config <path>` specified file
//! 3. Project root: `./reviewer.toml` or `./.reviewer.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/multi-reviewer/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigIssue, ConfigIssueCode, FileAgentsConfig, FileConfig, FileExecutionConfig,
    FileGithubMcpConfig, FileLocalFilesConfig, FileModelsConfig, FileOutputConfig, Severity,
};
pub use loader::ConfigLoader;
