//! GitHub MCP server settings from TOML (`[github_mcp]` section)
//!
//! Remote reviews read the repository through the GitHub MCP server. The
//! server entry is built once per run from the token and attached only to
//! sessions reviewing a remote target.

use super::{ConfigIssue, ConfigIssueCode, Severity};
use reviewer_application::{McpServerConfig, McpServers};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key of the GitHub entry in the session's MCP server map.
pub const GITHUB_SERVER_NAME: &str = "github";
const TOKEN_PLACEHOLDER: &str = "{token}";

/// Raw GitHub MCP configuration from TOML
///
/// # Example
///
/// ```toml
/// [github_mcp]
/// url = "https://api.githubcopilot.com/mcp/"
/// tools = ["*"]
/// auth_header_name = "Authorization"
/// auth_header_template = "Bearer {token}"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGithubMcpConfig {
    #[serde(rename = "type")]
    pub server_type: String,
    pub url: String,
    pub tools: Vec<String>,
    /// Extra headers sent on every request
    pub headers: BTreeMap<String, String>,
    pub auth_header_name: String,
    /// Auth header value; `{token}` is replaced with the GitHub token
    pub auth_header_template: String,
}

impl Default for FileGithubMcpConfig {
    fn default() -> Self {
        Self {
            server_type: "http".to_string(),
            url: "https://api.githubcopilot.com/mcp/".to_string(),
            tools: vec!["*".to_string()],
            headers: BTreeMap::new(),
            auth_header_name: "Authorization".to_string(),
            auth_header_template: format!("Bearer {}", TOKEN_PLACEHOLDER),
        }
    }
}

/// `https://` followed by a non-empty host.
fn is_https_url(url: &str) -> bool {
    url.strip_prefix("https://")
        .and_then(|rest| rest.split(['/', '?', '#']).next())
        .is_some_and(|host| !host.is_empty() && !host.starts_with(':'))
}

impl FileGithubMcpConfig {
    /// MCP servers for a session, or `None` without a usable token.
    pub fn build_servers(&self, token: Option<&str>) -> Option<McpServers> {
        let token = token.map(str::trim).filter(|t| !t.is_empty())?;

        let mut headers = self.headers.clone();
        headers.insert(
            self.auth_header_name.clone(),
            self.auth_header_template.replace(TOKEN_PLACEHOLDER, token),
        );

        let server = McpServerConfig {
            server_type: self.server_type.clone(),
            url: self.url.clone(),
            tools: self.tools.clone(),
            headers,
        };
        Some(Arc::new(BTreeMap::from([(
            GITHUB_SERVER_NAME.to_string(),
            server,
        )])))
    }

    pub(super) fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        for (field, value) in [
            ("github_mcp.type", &self.server_type),
            ("github_mcp.auth_header_name", &self.auth_header_name),
        ] {
            if value.trim().is_empty() {
                issues.push(ConfigIssue::empty(field));
            }
        }
        if !is_https_url(&self.url) {
            issues.push(ConfigIssue {
                severity: Severity::Error,
                code: ConfigIssueCode::InvalidUrl {
                    field: "github_mcp.url".to_string(),
                    value: self.url.clone(),
                },
                message: format!("github_mcp.url: '{}' must be an https URL with a host", self.url),
            });
        }
        if !self.auth_header_template.contains(TOKEN_PLACEHOLDER) {
            issues.push(ConfigIssue {
                severity: Severity::Warning,
                code: ConfigIssueCode::EmptyValue {
                    field: "github_mcp.auth_header_template".to_string(),
                },
                message: "github_mcp.auth_header_template has no {token} placeholder".to_string(),
            });
        }
        issues
    }
}
