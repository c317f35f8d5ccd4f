//! Skill discovery
//!
//! Skills come from two places:
//!
//! 1. A shared skills root (`.github/skills` by default), one directory per
//!    skill holding a `SKILL.md`. A skill whose `metadata.agent` names an
//!    agent is attached to that agent only; without it, to every agent.
//! 2. Per-agent files in `<agents dir>/<agent name>/*.skill.md`, attached to
//!    that agent unconditionally.

use super::parser::{SKILL_FILE_NAME, is_skill_file, load_skill_file};
use reviewer_domain::SkillDefinition;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loads shared and per-agent skills
#[derive(Debug, Clone, Default)]
pub struct SkillLoader {
    shared: Vec<SkillDefinition>,
}

/// `SKILL.md` files of every skill directory under `root`, sorted.
pub fn discover_skills(root: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("No skills under {}: {}", root.display(), e);
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .map(|dir| dir.join(SKILL_FILE_NAME))
        .filter(|file| file.is_file())
        .collect();
    files.sort();
    files
}

fn load_logged(files: Vec<PathBuf>) -> Vec<SkillDefinition> {
    files
        .into_iter()
        .filter_map(|file| match load_skill_file(&file) {
            Ok(skill) => {
                debug!("Loaded skill {} from {}", skill.id, file.display());
                Some(skill)
            }
            Err(e) => {
                warn!("Skipping skill file: {}", e);
                None
            }
        })
        .collect()
}

impl SkillLoader {
    /// Load the shared skills under `root`; a missing root yields none.
    pub fn new(root: Option<&Path>) -> Self {
        let Some(root) = root.filter(|r| r.is_dir()) else {
            return Self::default();
        };
        let shared = load_logged(discover_skills(root));
        if !shared.is_empty() {
            info!("Loaded {} shared skill(s) from {}", shared.len(), root.display());
        }
        Self { shared }
    }

    pub fn with_shared(shared: Vec<SkillDefinition>) -> Self {
        Self { shared }
    }

    pub fn shared(&self) -> &[SkillDefinition] {
        &self.shared
    }

    /// Per-agent skill files of `agent_name` under `agents_dir`, sorted.
    pub fn agent_skills(agents_dir: &Path, agent_name: &str) -> Vec<SkillDefinition> {
        let dir = agents_dir.join(agent_name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_skill_file(path))
            .collect();
        files.sort();
        load_logged(files)
    }

    /// Every skill attached to `agent_name`: matching shared skills first,
    /// then its own files.
    pub fn skills_for(&self, agents_dir: &Path, agent_name: &str) -> Vec<SkillDefinition> {
        self.shared
            .iter()
            .filter(|skill| skill.applies_to(agent_name))
            .cloned()
            .chain(Self::agent_skills(agents_dir, agent_name))
            .collect()
    }
}
