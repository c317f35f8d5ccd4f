//! Review result value object

use crate::agent::AgentIdentity;
use crate::core::error::DomainError;
use crate::core::string::is_blank;
use chrono::{DateTime, Local};
use serde::Serialize;

/// Outcome of one review, produced by an attempt or by the pass merger.
///
/// Built once and immutable afterwards. A successful result always carries
/// non-blank content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewResult {
    agent: AgentIdentity,
    target: String,
    content: Option<String>,
    success: bool,
    error_message: Option<String>,
    timestamp: DateTime<Local>,
}

impl ReviewResult {
    /// Successful result. Blank content is rejected.
    pub fn success(
        agent: AgentIdentity,
        target: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let content = content.into();
        if is_blank(Some(&content)) {
            return Err(DomainError::EmptyContent);
        }
        Ok(Self {
            agent,
            target: target.into(),
            content: Some(content),
            success: true,
            error_message: None,
            timestamp: Local::now(),
        })
    }

    /// Failed result carrying a human-readable error.
    pub fn failure(
        agent: AgentIdentity,
        target: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            target: target.into(),
            content: None,
            success: false,
            error_message: Some(error_message.into()),
            timestamp: Local::now(),
        }
    }

    pub fn agent(&self) -> &AgentIdentity {
        &self.agent
    }

    /// Display name of the reviewed target
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }
}
