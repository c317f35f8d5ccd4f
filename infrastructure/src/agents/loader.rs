//! Agent definition loader
//!
//! Agents are TOML files (`*.toml`) in one or more directories:
//!
//! ```toml
//! display_name = "Security"
//! model = "claude-sonnet-4.6"
//! system_prompt = "You are a security reviewer."
//! focus_areas = ["Injection", "Secrets in code"]
//! instruction = "Audit {target} for security issues."   # optional
//! ```
//!
//! or Copilot agent files (`*.agent.md`), where the markdown body is the
//! system prompt:
//!
//! ```markdown
//! ---
//! displayName: Security
//! model: claude-sonnet-4.6
//! focusAreas: [Injection, Secrets in code]
//! ---
//! You are a security reviewer.
//! ```
//!
//! `name` defaults to the file name without its extension. Directories are
//! read in order and a later definition replaces an earlier one with the
//! same name. Skills from the [`SkillLoader`] are attached after parsing.

use crate::markdown::{parse_frontmatter, split_frontmatter};
use crate::skills::SkillLoader;
use reviewer_domain::{AgentConfig, DomainError, Model};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const AGENT_EXTENSION: &str = "toml";
const MARKDOWN_AGENT_SUFFIX: &str = ".agent.md";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AgentFrontmatter {
    name: Option<String>,
    #[serde(alias = "displayName")]
    display_name: Option<String>,
    model: Option<String>,
    #[serde(alias = "focusAreas")]
    focus_areas: Vec<String>,
    instruction: Option<String>,
}

fn is_markdown_agent(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().to_lowercase().ends_with(MARKDOWN_AGENT_SUFFIX))
}

fn is_agent_file(path: &Path) -> bool {
    path.is_file()
        && (is_markdown_agent(path) || path.extension().is_some_and(|ext| ext == AGENT_EXTENSION))
}

/// Agent name implied by the file name.
fn default_name(path: &Path) -> String {
    if is_markdown_agent(path) {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return file_name[..file_name.len() - MARKDOWN_AGENT_SUFFIX.len()].to_string();
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse a `*.agent.md` definition; the body becomes the system prompt.
fn parse_markdown_agent(text: &str, path: &Path) -> Result<AgentConfig, AgentLoadError> {
    let (header, body) = match split_frontmatter(text) {
        Some((yaml, body)) => {
            let header: AgentFrontmatter =
                parse_frontmatter(yaml).map_err(|e| AgentLoadError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
            (header, body)
        }
        None => (AgentFrontmatter::default(), text),
    };

    let mut agent = AgentConfig::new(header.name.unwrap_or_default(), body.trim())
        .with_display_name(header.display_name.unwrap_or_default())
        .with_focus_areas(header.focus_areas);
    if let Some(model) = header.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        agent = agent.with_model(Model::from(model));
    }
    if let Some(instruction) = header.instruction {
        agent = agent.with_instruction(instruction);
    }
    Ok(agent)
}

/// Errors raised while loading or selecting agents
#[derive(Error, Debug)]
pub enum AgentLoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid agent in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: DomainError,
    },

    #[error("Unknown agent(s): {}", .0.join(", "))]
    UnknownAgents(Vec<String>),
}

/// Loads agent definitions from a list of directories
#[derive(Debug, Clone, Default)]
pub struct AgentLoader {
    directories: Vec<PathBuf>,
    skills: SkillLoader,
}

impl AgentLoader {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            skills: SkillLoader::default(),
        }
    }

    pub fn with_skills(mut self, skills: SkillLoader) -> Self {
        self.skills = skills;
        self
    }

    /// Append a directory with the highest priority.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directories.push(directory.into());
        self
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Parse one agent file.
    pub fn load_file(path: &Path) -> Result<AgentConfig, AgentLoadError> {
        let text = fs::read_to_string(path).map_err(|source| AgentLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut agent = if is_markdown_agent(path) {
            parse_markdown_agent(&text, path)?
        } else {
            toml::from_str::<AgentConfig>(&text).map_err(|e| AgentLoadError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        if agent.name.trim().is_empty() {
            agent.name = default_name(path);
        }
        agent.validate().map_err(|source| AgentLoadError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(agent)
    }

    /// Load every agent from every directory, keyed by name.
    ///
    /// Missing directories are skipped; a broken file is logged and skipped
    /// so one bad definition does not hide the others.
    pub fn load_all(&self) -> Result<BTreeMap<String, AgentConfig>, AgentLoadError> {
        let mut agents = BTreeMap::new();

        for directory in &self.directories {
            if !directory.is_dir() {
                debug!("Agents directory does not exist: {}", directory.display());
                continue;
            }
            info!("Loading agents from: {}", directory.display());

            let entries = fs::read_dir(directory).map_err(|source| AgentLoadError::Io {
                path: directory.clone(),
                source,
            })?;
            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| is_agent_file(path))
                .collect();
            files.sort();

            for file in files {
                match Self::load_file(&file) {
                    Ok(mut agent) => {
                        let skills = self.skills.skills_for(directory, &agent.name);
                        if !skills.is_empty() {
                            info!("Loaded {} skill(s) for agent: {}", skills.len(), agent.name);
                            agent.skills.extend(skills);
                        }
                        if agents.contains_key(&agent.name) {
                            debug!("Agent '{}' overridden by {}", agent.name, file.display());
                        }
                        info!("Loaded agent: {} from {}", agent.name, file.display());
                        agents.insert(agent.name.clone(), agent);
                    }
                    Err(e) => warn!("Skipping agent file: {}", e),
                }
            }
        }

        if agents.is_empty() {
            warn!("No agents found in any configured directory");
        }
        Ok(agents)
    }

    /// Pick agents by name, keeping the requested order.
    ///
    /// Every unknown name is reported at once.
    pub fn select(
        agents: &BTreeMap<String, AgentConfig>,
        names: &[String],
    ) -> Result<Vec<AgentConfig>, AgentLoadError> {
        let unknown: Vec<String> = names
            .iter()
            .filter(|name| !agents.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(AgentLoadError::UnknownAgents(unknown));
        }

        let mut selected: Vec<AgentConfig> = Vec::with_capacity(names.len());
        for name in names {
            if selected.iter().any(|a| &a.name == name) {
                continue;
            }
            if let Some(agent) = agents.get(name) {
                selected.push(agent.clone());
            }
        }
        Ok(selected)
    }
}
