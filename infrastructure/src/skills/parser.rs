//! Skill file parsing
//!
//! ```markdown
//! ---
//! name: Dependency audit
//! description: Find outdated or vulnerable dependencies
//! parameters:
//!   - name: repository
//!     description: Target repository
//!     required: true
//!   - name: branch
//!     default: main
//! metadata:
//!   agent: security
//! ---
//! Audit the dependencies of ${repository} on ${branch}.
//! ```
//!
//! A file without frontmatter is used whole as the prompt.

use crate::markdown::{FrontmatterError, parse_frontmatter, scalar_to_string, split_frontmatter};
use reviewer_domain::{SkillDefinition, SkillParameter};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// File name of a skill inside its own directory
pub const SKILL_FILE_NAME: &str = "SKILL.md";

/// Suffix of per-agent skill files
pub const SKILL_FILE_SUFFIX: &str = ".skill.md";

#[derive(Error, Debug)]
pub enum SkillLoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: FrontmatterError,
    },

    #[error("Skill file {0} has no prompt content")]
    EmptyPrompt(PathBuf),
}

#[derive(Debug, Default, Deserialize)]
struct SkillFrontmatter {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    parameters: Vec<ParameterFrontmatter>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ParameterFrontmatter {
    name: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    required: Value,
    default: Option<Value>,
}

impl ParameterFrontmatter {
    fn into_parameter(self) -> SkillParameter {
        let mut parameter = SkillParameter::new(self.name.unwrap_or_else(|| "unknown".to_string()));
        if let Some(description) = self.description {
            parameter.description = description;
        }
        if let Some(kind) = self.kind.filter(|k| !k.trim().is_empty()) {
            parameter.kind = kind;
        }
        parameter.required = scalar_to_string(&self.required)
            .is_some_and(|r| r.trim().eq_ignore_ascii_case("true"));
        parameter.default = self.default.as_ref().and_then(scalar_to_string);
        parameter
    }
}

/// Whether `path` names a skill file (`SKILL.md` or `*.skill.md`).
pub fn is_skill_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .is_some_and(|name| name == SKILL_FILE_NAME || name.to_lowercase().ends_with(SKILL_FILE_SUFFIX))
}

/// Skill id of a file: the directory name for `SKILL.md`, otherwise the
/// file name without `.skill.md` (or `.md`).
pub fn skill_id(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if file_name == SKILL_FILE_NAME {
        return path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name);
    }
    let lowered = file_name.to_lowercase();
    for suffix in [SKILL_FILE_SUFFIX, ".md"] {
        if lowered.ends_with(suffix) {
            return file_name[..file_name.len() - suffix.len()].to_string();
        }
    }
    file_name
}

/// Parse skill markdown for the skill `id`.
pub fn parse_skill(id: &str, content: &str, path: &Path) -> Result<SkillDefinition, SkillLoadError> {
    let Some((yaml, body)) = split_frontmatter(content) else {
        warn!("No frontmatter in {}, using the whole file as the prompt", path.display());
        let prompt = content.trim();
        if prompt.is_empty() {
            return Err(SkillLoadError::EmptyPrompt(path.to_path_buf()));
        }
        return Ok(SkillDefinition::new(id, prompt));
    };

    let header: SkillFrontmatter =
        parse_frontmatter(yaml).map_err(|source| SkillLoadError::Frontmatter {
            path: path.to_path_buf(),
            source,
        })?;
    let body = body.trim();
    if body.is_empty() {
        return Err(SkillLoadError::EmptyPrompt(path.to_path_buf()));
    }

    let mut skill = SkillDefinition::new(id, body);
    if let Some(name) = header.name.filter(|n| !n.trim().is_empty()) {
        skill.name = name;
    }
    skill.description = header.description.unwrap_or_default();
    skill.parameters = header
        .parameters
        .into_iter()
        .map(ParameterFrontmatter::into_parameter)
        .collect();
    skill.metadata = header
        .metadata
        .iter()
        .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key.clone(), v)))
        .collect();
    Ok(skill)
}

/// Read and parse one skill file.
pub fn load_skill_file(path: &Path) -> Result<SkillDefinition, SkillLoadError> {
    let content = fs::read_to_string(path).map_err(|source| SkillLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_skill(&skill_id(path), &content, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUDIT: &str = r#"---
name: Dependency audit
description: "Find outdated dependencies"
parameters:
  - name: repository
    description: Target repository
    required: true
  - name: depth
    type: integer
    default: 3
metadata:
  agent: security
  version: 1.0
---

Audit ${repository} down to depth ${depth}.
"#;

    #[test]
    fn test_parse_skill_with_frontmatter() {
        let skill = parse_skill("audit", AUDIT, Path::new("audit/SKILL.md")).unwrap();
        assert_eq!(skill.id, "audit");
        assert_eq!(skill.name, "Dependency audit");
        assert_eq!(skill.description, "Find outdated dependencies");
        assert_eq!(skill.prompt, "Audit ${repository} down to depth ${depth}.");

        assert_eq!(skill.parameters.len(), 2);
        assert_eq!(skill.parameters[0].name, "repository");
        assert!(skill.parameters[0].required);
        assert_eq!(skill.parameters[0].kind, "string");
        assert_eq!(skill.parameters[1].kind, "integer");
        assert_eq!(skill.parameters[1].default.as_deref(), Some("3"));

        assert_eq!(skill.agent(), Some("security"));
        assert_eq!(skill.metadata["version"], "1.0");
    }

    #[test]
    fn test_parse_skill_without_frontmatter() {
        let skill = parse_skill("plain", "  Summarize the README.\n", Path::new("plain.skill.md")).unwrap();
        assert_eq!(skill.name, "plain");
        assert_eq!(skill.prompt, "Summarize the README.");
        assert!(skill.parameters.is_empty());
    }

    #[test]
    fn test_parse_skill_rejects_empty_body() {
        let err = parse_skill("empty", "---\nname: Empty\n---\n  \n", Path::new("empty.skill.md")).unwrap_err();
        assert!(matches!(err, SkillLoadError::EmptyPrompt(_)));
    }

    #[test]
    fn test_parse_skill_rejects_invalid_yaml() {
        let err = parse_skill("bad", "---\nparameters: [\n---\nbody", Path::new("bad/SKILL.md")).unwrap_err();
        assert!(matches!(err, SkillLoadError::Frontmatter { .. }));
    }

    #[test]
    fn test_skill_id() {
        assert_eq!(skill_id(Path::new(".github/skills/audit/SKILL.md")), "audit");
        assert_eq!(skill_id(Path::new("agents/security/owasp.skill.md")), "owasp");
        assert_eq!(skill_id(Path::new("notes.md")), "notes");
    }

    #[test]
    fn test_is_skill_file() {
        assert!(is_skill_file(Path::new("x/SKILL.md")));
        assert!(is_skill_file(Path::new("owasp.Skill.md")));
        assert!(!is_skill_file(Path::new("skill.md")));
        assert!(!is_skill_file(Path::new("security.agent.md")));
    }
}
