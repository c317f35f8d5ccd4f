//! Review model configuration from TOML (`[models]` section)

use super::ConfigIssue;
use reviewer_domain::Model;
use serde::{Deserialize, Serialize};

/// Review model configuration from TOML
///
/// # Example
///
/// ```toml
/// [models]
/// review = "claude-opus-4.6"     # overrides every agent's model
/// reasoning_effort = "high"      # only sent to reasoning models
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelsConfig {
    /// Model forced onto every agent
    pub review: Option<String>,
    /// Reasoning effort for reasoning models
    pub reasoning_effort: Option<String>,
}

impl FileModelsConfig {
    /// The review model override, if a non-blank one is configured.
    pub fn review_model(&self) -> Option<Model> {
        self.review
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Model::from)
    }

    pub(super) fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.review.as_deref().is_some_and(|s| s.trim().is_empty()) {
            issues.push(ConfigIssue::empty("models.review"));
        }
        if self
            .reasoning_effort
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            issues.push(ConfigIssue::empty("models.reasoning_effort"));
        }
        issues
    }
}
