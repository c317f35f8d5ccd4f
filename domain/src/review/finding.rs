//! Finding extraction from free-text review content.
//!
//! A finding is a `### <n>. <title>` header plus the body up to the next
//! header. Its [`FindingKey`] is derived from the title and the
//! Priority / Summary / Location table rows.

use crate::prompt::template::{LOCATION_LABEL, PRIORITY_LABEL, SUMMARY_LABEL};
use regex::Regex;
use std::sync::LazyLock;

static FINDING_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^###\s+(\d+)\.\s+(.+?)\s*$").expect("finding header pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// A structural finding block extracted from one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub title: String,
    pub body: String,
}

/// Deduplication key for a finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FindingKey {
    /// Title plus at least one of the table fields
    Structured {
        title: String,
        priority: String,
        location: String,
        summary: String,
    },
    /// Free-form block: normalized body text
    Raw(String),
    /// Whole content of a pass without any finding headers
    Fallback(String),
}

impl Finding {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn key(&self) -> FindingKey {
        let title = normalize(&self.title);
        let priority = normalize(table_value(&self.body, PRIORITY_LABEL).unwrap_or_default());
        let summary = normalize(table_value(&self.body, SUMMARY_LABEL).unwrap_or_default());
        let location = normalize(table_value(&self.body, LOCATION_LABEL).unwrap_or_default());

        if !title.is_empty() && !(priority.is_empty() && summary.is_empty() && location.is_empty()) {
            FindingKey::Structured {
                title,
                priority,
                location,
                summary,
            }
        } else {
            FindingKey::Raw(normalize(&self.body))
        }
    }
}

/// Split content into finding blocks. Headers with an empty body are skipped.
pub fn extract_findings(content: &str) -> Vec<Finding> {
    let headers: Vec<(usize, usize, &str)> = FINDING_HEADER
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let title = caps.get(2)?.as_str().trim();
            Some((whole.start(), whole.end(), title))
        })
        .collect();

    headers
        .iter()
        .enumerate()
        .filter_map(|(i, &(_, end, title))| {
            let body_end = headers.get(i + 1).map_or(content.len(), |next| next.0);
            let body = content[end..body_end].trim();
            (!body.is_empty()).then(|| Finding::new(title, body))
        })
        .collect()
}

/// Value of a `| **label** | value |` table row, if present.
pub fn table_value<'a>(body: &'a str, label: &str) -> Option<&'a str> {
    let prefix = format!("**{}**", label);
    body.lines().find_map(|line| {
        let cells = line.trim().strip_prefix('|')?.strip_suffix('|')?;
        let (head, value) = cells.split_once('|')?;
        (head.trim() == prefix).then(|| value.trim())
    })
}

/// Case-fold, drop markdown emphasis and backticks, collapse whitespace.
pub fn normalize(value: &str) -> String {
    let stripped: String = value
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '`' | '*' | '_'))
        .collect();
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FINDINGS: &str = "\
Intro text

### 1. SQL Injection

| Item | Content |
|------|---------|
| **Priority** | High |
| **Summary** | Query built by string concat |
| **Location** | `a.go` L10 |

---

### 2. Missing timeout

Plain text without a table.
";

    #[test]
    fn test_extract_findings() {
        let findings = extract_findings(TWO_FINDINGS);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].title, "SQL Injection");
        assert!(findings[0].body.starts_with("| Item |"));
        assert!(findings[0].body.ends_with("---"));
        assert_eq!(findings[1].body, "Plain text without a table.");
    }

    #[test]
    fn test_extract_skips_empty_bodies() {
        let findings = extract_findings("### 1. Empty\n### 2. Full\nbody");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Full");
    }

    #[test]
    fn test_no_headers() {
        assert!(extract_findings("Looks good to me.").is_empty());
    }

    #[test]
    fn test_table_value() {
        let body = "| **Priority** | High |\n| **Location** | `a.go` L10 |";
        assert_eq!(table_value(body, "Priority"), Some("High"));
        assert_eq!(table_value(body, "Location"), Some("`a.go` L10"));
        assert_eq!(table_value(body, "Summary"), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  **SQL**   `Injection`\n_here_ "), "sql injection here");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_structured_key() {
        let findings = extract_findings(TWO_FINDINGS);
        match findings[0].key() {
            FindingKey::Structured {
                title,
                priority,
                location,
                summary,
            } => {
                assert_eq!(title, "sql injection");
                assert_eq!(priority, "high");
                assert_eq!(location, "a.go l10");
                assert_eq!(summary, "query built by string concat");
            }
            other => panic!("unexpected key {:?}", other),
        }
        assert_eq!(
            findings[1].key(),
            FindingKey::Raw("plain text without a table.".to_string())
        );
    }

    #[test]
    fn test_key_ignores_formatting_differences() {
        let a = Finding::new("SQL Injection", "| **Priority** | High |\n| **Location** | a.go:10 |");
        let b = Finding::new("sql  injection", "| **Priority** | **HIGH** |\n| **Location** | `a.go:10` |");
        assert_eq!(a.key(), b.key());
    }
}
