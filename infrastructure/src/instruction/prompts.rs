//! Reusable prompt files (`.github/prompts/*.prompt.md`)
//!
//! Each file may start with a frontmatter block carrying `description` and
//! `agent`; the body is appended to every system prompt like a custom
//! instruction.

use crate::markdown::{parse_frontmatter, split_frontmatter};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prompt directory relative to a base directory
pub const PROMPTS_DIRECTORY: &str = ".github/prompts";

const PROMPT_SUFFIX: &str = ".prompt.md";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PromptFrontmatter {
    description: Option<String>,
    agent: Option<String>,
}

/// One loaded prompt file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptFile {
    pub path: PathBuf,
    pub description: Option<String>,
    pub agent: Option<String>,
    pub content: String,
}

impl PromptFile {
    /// Parse prompt markdown. A file whose body is empty, or whose
    /// frontmatter cannot be read, is used verbatim.
    pub fn parse(path: impl Into<PathBuf>, raw: &str) -> Self {
        let path = path.into();
        let Some((yaml, body)) = split_frontmatter(raw) else {
            return Self::verbatim(path, raw);
        };
        let header: PromptFrontmatter = match parse_frontmatter(yaml) {
            Ok(header) => header,
            Err(e) => {
                debug!("Ignoring frontmatter of {}: {}", path.display(), e);
                return Self::verbatim(path, raw);
            }
        };
        let body = body.trim();
        Self {
            path,
            description: header.description.filter(|d| !d.trim().is_empty()),
            agent: header.agent.filter(|a| !a.trim().is_empty()),
            content: if body.is_empty() { raw.trim().to_string() } else { body.to_string() },
        }
    }

    fn verbatim(path: PathBuf, raw: &str) -> Self {
        Self {
            path,
            description: None,
            agent: None,
            content: raw.trim().to_string(),
        }
    }

    /// Section appended to the system prompt.
    pub fn to_instruction(&self) -> String {
        match &self.description {
            Some(description) => format!("### {}\n\n{}", description, self.content),
            None => self.content.clone(),
        }
    }
}

/// Load every `*.prompt.md` under `<base>/.github/prompts`, sorted by path.
///
/// Blank files are skipped; unreadable files are logged and skipped.
pub fn load_prompt_files(base: &Path) -> Vec<PromptFile> {
    let dir = base.join(PROMPTS_DIRECTORY);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => {
            debug!("Prompts directory not found: {}", dir.display());
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().ends_with(PROMPT_SUFFIX))
        })
        .collect();
    paths.sort();

    let mut prompts = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read prompt file {}: {}", path.display(), e);
                continue;
            }
        };
        if raw.trim().is_empty() {
            debug!("Prompt file is empty: {}", path.display());
            continue;
        }
        let prompt = PromptFile::parse(path, &raw);
        info!(
            "Loaded prompt from {} ({})",
            prompt.path.display(),
            prompt.description.as_deref().unwrap_or("no description")
        );
        prompts.push(prompt);
    }
    prompts
}
