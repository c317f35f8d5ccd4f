//! Review target: what the agents are pointed at.
//!
//! A target is either a remote GitHub repository (agents read it through the
//! GitHub MCP server) or a local directory (source content is collected up
//! front and embedded into the instruction).

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The thing being reviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewTarget {
    /// A GitHub repository in `owner/name` form.
    Remote { repository: String },
    /// A directory on the local filesystem.
    Local { directory: PathBuf },
}

impl ReviewTarget {
    /// Create a remote target, validating the `owner/name` shape.
    pub fn remote(repository: impl Into<String>) -> Result<Self, DomainError> {
        let repository = repository.into().trim().to_string();
        let mut parts = repository.split('/');
        let valid = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !valid {
            return Err(DomainError::InvalidTarget(format!(
                "expected owner/name, got '{}'",
                repository
            )));
        }
        Ok(Self::Remote { repository })
    }

    /// Create a local directory target.
    pub fn local(directory: impl Into<PathBuf>) -> Self {
        Self::Local {
            directory: directory.into(),
        }
    }

    /// Human-readable name used in results and reports.
    pub fn display_name(&self) -> String {
        match self {
            ReviewTarget::Remote { repository } => repository.clone(),
            ReviewTarget::Local { directory } => directory
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| directory.display().to_string()),
        }
    }

    /// Directory to collect sources from, for local targets.
    pub fn local_directory(&self) -> Option<&Path> {
        match self {
            ReviewTarget::Local { directory } => Some(directory),
            ReviewTarget::Remote { .. } => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ReviewTarget::Local { .. })
    }
}

impl std::fmt::Display for ReviewTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewTarget::Remote { repository } => write!(f, "github:{}", repository),
            ReviewTarget::Local { directory } => write!(f, "local:{}", directory.display()),
        }
    }
}
