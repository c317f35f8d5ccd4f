//! Frontmatter splitting and parsing

use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;

const DELIMITER: &str = "---";

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Invalid frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Split `content` into its frontmatter and body.
///
/// The frontmatter sits between a leading `---` line and the next `---`
/// line. Returns `None` when either delimiter is missing.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content.strip_prefix(DELIMITER)?;
    let rest = rest.trim_start_matches([' ', '\t', '\r']).strip_prefix('\n')?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let yaml = rest[..offset].trim_end_matches(['\n', '\r']);
            return Some((yaml, &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Deserialize a frontmatter block; an empty block yields the default.
pub fn parse_frontmatter<T: DeserializeOwned + Default>(yaml: &str) -> Result<T, FrontmatterError> {
    if yaml.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Text form of a scalar value (`"1.0"`, `1.0` and `true` alike).
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
