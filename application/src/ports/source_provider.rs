//! Source content provider port
//!
//! Local targets have their sources collected once, before orchestration
//! starts, and the result is shared read-only by every agent.

use std::path::Path;
use thiserror::Error;

/// Errors raised while collecting local sources
#[derive(Error, Debug)]
pub enum SourceCollectionError {
    #[error("Directory not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pre-collected, size-capped source content of a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCollection {
    /// Markdown rendering of every collected file.
    pub review_content: String,
    /// Directory / file count / size / file list overview.
    pub directory_summary: String,
    pub file_count: usize,
    pub total_bytes: u64,
}

impl SourceCollection {
    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }

    /// Text embedded into local review instructions.
    pub fn instruction_content(&self) -> String {
        if self.is_empty() {
            return "(no source files found)".to_string();
        }
        format!("{}\n\n{}", self.directory_summary.trim_end(), self.review_content)
    }
}

/// Collects review content for a local directory.
pub trait SourceContentProvider: Send + Sync {
    fn collect(&self, directory: &Path) -> Result<SourceCollection, SourceCollectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_content() {
        assert_eq!(
            SourceCollection::default().instruction_content(),
            "(no source files found)"
        );

        let collection = SourceCollection {
            review_content: "### main.rs".to_string(),
            directory_summary: "Files: 1\n".to_string(),
            file_count: 1,
            total_bytes: 10,
        };
        assert_eq!(collection.instruction_content(), "Files: 1\n\n### main.rs");
    }
}
