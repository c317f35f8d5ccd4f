//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Conversion into application types happens here, validation reports
//! every problem at once instead of failing on the first one.

mod agents;
mod execution;
mod github_mcp;
mod local_files;
mod models;
mod output;

pub use agents::FileAgentsConfig;
pub use execution::FileExecutionConfig;
pub use github_mcp::FileGithubMcpConfig;
pub use local_files::FileLocalFilesConfig;
pub use models::FileModelsConfig;
pub use output::FileOutputConfig;

use reviewer_application::{ExecutionParams, ExecutionParamsError, ExecutionStrategy};
use serde::{Deserialize, Serialize};

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    EmptyValue { field: String },
    InvalidEnumValue { field: String, value: String, valid_values: Vec<String> },
    InvalidUrl { field: String, value: String },
    OutOfRange { field: String },
}

/// A detected issue in the loaded configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub(crate) fn empty(field: &str) -> Self {
        Self {
            severity: Severity::Error,
            code: ConfigIssueCode::EmptyValue {
                field: field.to_string(),
            },
            message: format!("{}: value cannot be empty", field),
        }
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Run control: parallelism, timeouts, retries, passes, strategy
    pub execution: FileExecutionConfig,
    /// Review model selection
    pub models: FileModelsConfig,
    /// Local directory collection limits and filters
    pub local_files: FileLocalFilesConfig,
    /// GitHub MCP server attached to remote reviews
    pub github_mcp: FileGithubMcpConfig,
    /// Agent definition directories
    pub agents: FileAgentsConfig,
    /// Report output settings
    pub output: FileOutputConfig,
    /// Legacy switch for the scoped executor (`REVIEWER_STRUCTURED_CONCURRENCY`)
    pub structured_concurrency: Option<bool>,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        issues.extend(self.execution.validate());
        issues.extend(self.models.validate());
        issues.extend(self.local_files.validate());
        issues.extend(self.github_mcp.validate());
        issues
    }

    /// Execution parameters with the legacy structured concurrency flag applied.
    ///
    /// An explicit `execution.strategy` wins over the flag.
    pub fn execution_params(&self) -> Result<ExecutionParams, ExecutionParamsError> {
        let mut params = self.execution.to_params()?;
        if self.execution.strategy.is_none() && self.structured_concurrency == Some(true) {
            params = params.with_strategy(ExecutionStrategy::Scoped);
        }
        Ok(params)
    }
}
