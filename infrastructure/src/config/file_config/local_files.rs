//! Local source collection from TOML (`[local_files]` section)

use super::{ConfigIssue, ConfigIssueCode, Severity};
use serde::{Deserialize, Serialize};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Limits and filters applied when collecting a local directory.
///
/// Name lists are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLocalFilesConfig {
    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,
    /// Collection stops once this many bytes have been gathered
    pub max_total_size: u64,
    /// Directory names never descended into
    pub ignored_directories: Vec<String>,
    /// Extensions (without dot) treated as source files
    pub source_extensions: Vec<String>,
    /// Extensionless file names treated as source files
    pub source_filenames: Vec<String>,
    /// Substrings marking a file name as sensitive
    pub sensitive_patterns: Vec<String>,
    /// Extensions marking a file as sensitive
    pub sensitive_extensions: Vec<String>,
}

impl Default for FileLocalFilesConfig {
    fn default() -> Self {
        Self {
            max_file_size: 256 * 1024,
            max_total_size: 2 * 1024 * 1024,
            ignored_directories: strings(&[
                ".git", ".svn", ".hg", "node_modules", "target", "build", "dist", "out",
                "bin", "obj", ".gradle", ".idea", ".vscode", "__pycache__", ".venv", "venv",
                "vendor", "coverage", ".next",
            ]),
            source_extensions: strings(&[
                "java", "kt", "kts", "scala", "groovy", "gradle", "rs", "go", "c", "h", "cc",
                "cpp", "hpp", "cs", "fs", "swift", "m", "py", "rb", "php", "pl", "lua", "js",
                "mjs", "cjs", "ts", "jsx", "tsx", "vue", "svelte", "html", "css", "scss",
                "sql", "sh", "bash", "zsh", "ps1", "psm1", "yml", "yaml", "toml", "json",
                "xml", "md", "proto", "graphql", "tf", "dart", "ex", "exs", "erl", "hs",
            ]),
            source_filenames: strings(&["makefile", "dockerfile", "rakefile", "gemfile"]),
            sensitive_patterns: strings(&[
                "secret", "credential", "password", "passwd", "id_rsa", "id_ecdsa",
                "id_ed25519", ".npmrc", ".pypirc", ".netrc", "htpasswd",
            ]),
            sensitive_extensions: strings(&[
                "env", "pem", "key", "p12", "pfx", "jks", "keystore", "crt", "cer", "der",
                "kdbx",
            ]),
        }
    }
}

impl FileLocalFilesConfig {
    pub(super) fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.max_file_size == 0 || self.max_total_size == 0 {
            issues.push(ConfigIssue {
                severity: Severity::Error,
                code: ConfigIssueCode::OutOfRange {
                    field: "local_files".to_string(),
                },
                message: "local_files: size limits must be greater than zero".to_string(),
            });
        }
        if self.max_file_size > self.max_total_size {
            issues.push(ConfigIssue {
                severity: Severity::Warning,
                code: ConfigIssueCode::OutOfRange {
                    field: "local_files.max_file_size".to_string(),
                },
                message: "local_files.max_file_size exceeds max_total_size; large files can never be included"
                    .to_string(),
            });
        }
        if self.source_extensions.is_empty() && self.source_filenames.is_empty() {
            issues.push(ConfigIssue {
                severity: Severity::Warning,
                code: ConfigIssueCode::EmptyValue {
                    field: "local_files.source_extensions".to_string(),
                },
                message: "local_files: no source extensions configured, local reviews will see no files"
                    .to_string(),
            });
        }
        issues
    }
}
