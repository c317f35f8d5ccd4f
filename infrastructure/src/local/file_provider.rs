//! Local file system source provider
//!
//! Implements [`SourceContentProvider`] by walking a directory and rendering
//! every eligible source file as a fenced markdown block.
//!
//! # Filtering
//!
//! - Ignored directories are never descended into
//! - Symlinks are skipped, and so is anything resolving outside the base directory
//! - A file is a candidate when its extension or its well-known name is listed
//! - Sensitive files (by extension or by substring of the name) are excluded
//!
//! Candidates are visited in path order. Files above the per-file limit are
//! skipped; collection stops at the first file that would exceed the total
//! limit. Files that are not valid UTF-8 are skipped.

use crate::config::FileLocalFilesConfig;
use reviewer_application::{SourceCollection, SourceCollectionError, SourceContentProvider};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Source provider that reads from the local file system.
#[derive(Debug, Clone)]
pub struct LocalFileProvider {
    max_file_size: u64,
    max_total_size: u64,
    ignored_directories: HashSet<String>,
    source_extensions: HashSet<String>,
    source_filenames: HashSet<String>,
    sensitive_patterns: Vec<String>,
    sensitive_extensions: HashSet<String>,
}

struct Candidate {
    path: PathBuf,
    relative: String,
    size: u64,
}

fn lowered(values: &[String]) -> HashSet<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Fence language for a file extension.
fn language_for(extension: &str) -> &str {
    match extension {
        "js" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "py" => "python",
        "rb" => "ruby",
        "rs" => "rust",
        "kt" | "kts" => "kotlin",
        "cs" => "csharp",
        "fs" => "fsharp",
        "sh" | "bash" | "zsh" => "bash",
        "ps1" | "psm1" => "powershell",
        "yml" => "yaml",
        "md" => "markdown",
        other => other,
    }
}

fn extension_of(name: &str) -> Option<String> {
    name.rfind('.')
        .map(|dot| name[dot + 1..].to_lowercase())
        .filter(|ext| !ext.is_empty())
}

impl LocalFileProvider {
    pub fn new(config: &FileLocalFilesConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            max_total_size: config.max_total_size,
            ignored_directories: lowered(&config.ignored_directories),
            source_extensions: lowered(&config.source_extensions),
            source_filenames: lowered(&config.source_filenames),
            sensitive_patterns: config
                .sensitive_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            sensitive_extensions: lowered(&config.sensitive_extensions),
        }
    }

    fn is_source(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.source_filenames.contains(&name) {
            return true;
        }
        extension_of(&name).is_some_and(|ext| self.source_extensions.contains(&ext))
    }

    fn is_sensitive(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if extension_of(&name).is_some_and(|ext| self.sensitive_extensions.contains(&ext)) {
            return true;
        }
        self.sensitive_patterns.iter().any(|p| name.contains(p.as_str()))
    }

    fn walk(&self, base: &Path, dir: &Path, out: &mut Vec<Candidate>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry in {:?}: {}", dir, e);
                    continue;
                }
            };
            let path = entry.path();
            // symlink_metadata does not follow links
            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    debug!("Skipping unreadable entry {:?}: {}", path, e);
                    continue;
                }
            };
            if metadata.file_type().is_symlink() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if metadata.is_dir() {
                if self.ignored_directories.contains(&name.to_lowercase()) {
                    continue;
                }
                if let Err(e) = self.walk(base, &path, out) {
                    warn!("Skipping unreadable directory {:?}: {}", path, e);
                }
                continue;
            }
            if !metadata.is_file() || !self.is_source(&name) || self.is_sensitive(&name) {
                continue;
            }

            let within_base = path
                .canonicalize()
                .map(|resolved| resolved.starts_with(base))
                .unwrap_or(false);
            if !within_base {
                continue;
            }

            let relative = path
                .strip_prefix(base)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            out.push(Candidate {
                path,
                relative,
                size: metadata.len(),
            });
        }
        Ok(())
    }
}

impl SourceContentProvider for LocalFileProvider {
    fn collect(&self, directory: &Path) -> Result<SourceCollection, SourceCollectionError> {
        if !directory.exists() {
            return Err(SourceCollectionError::NotFound(directory.display().to_string()));
        }
        if !directory.is_dir() {
            return Err(SourceCollectionError::NotADirectory(
                directory.display().to_string(),
            ));
        }
        let base = directory.canonicalize()?;

        let mut candidates = Vec::new();
        self.walk(&base, &base, &mut candidates)?;
        candidates.sort_by(|a, b| a.path.cmp(&b.path));

        let mut content = String::new();
        let mut included: Vec<(String, u64)> = Vec::new();
        let mut total: u64 = 0;

        for candidate in candidates {
            if candidate.size > self.max_file_size {
                debug!(
                    "Skipping {} ({} bytes exceeds the per-file limit)",
                    candidate.relative, candidate.size
                );
                continue;
            }
            if total + candidate.size > self.max_total_size {
                info!(
                    "Total size limit of {} bytes reached, stopping at {}",
                    self.max_total_size, candidate.relative
                );
                break;
            }
            let text = match fs::read_to_string(&candidate.path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to read {}: {}", candidate.relative, e);
                    continue;
                }
            };

            let extension = extension_of(&candidate.relative).unwrap_or_default();
            let _ = write!(
                content,
                "### {}\n\n```{}\n{}",
                candidate.relative,
                language_for(&extension),
                text
            );
            if !text.ends_with('\n') {
                content.push('\n');
            }
            content.push_str("```\n\n");

            total += candidate.size;
            included.push((candidate.relative, candidate.size));
        }

        if included.is_empty() {
            return Ok(SourceCollection {
                review_content: "(no source files found)".to_string(),
                directory_summary: format!("No source files found in: {}", base.display()),
                file_count: 0,
                total_bytes: 0,
            });
        }

        let mut summary = format!(
            "Directory: {}\nFiles: {}\nTotal size: {} bytes\n\nFile list:\n",
            base.display(),
            included.len(),
            total
        );
        for (relative, size) in &included {
            let _ = writeln!(summary, "  - {} ({} bytes)", relative, size);
        }

        info!(
            "Collected {} source files ({} bytes) from {}",
            included.len(),
            total,
            base.display()
        );

        Ok(SourceCollection {
            review_content: content,
            directory_summary: summary,
            file_count: included.len(),
            total_bytes: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn provider() -> LocalFileProvider {
        LocalFileProvider::new(&FileLocalFilesConfig::default())
    }

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_collects_sources_in_path_order() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "app.ts", "export {}\n");
        write(dir.path(), "Makefile", "all:\n");
        write(dir.path(), "image.png", "binary");

        let collection = provider().collect(dir.path()).unwrap();
        assert_eq!(collection.file_count, 3);

        let content = &collection.review_content;
        assert!(content.contains("### src/main.rs\n\n```rust\nfn main() {}\n```\n\n"));
        assert!(content.contains("```typescript\nexport {}\n```"));
        assert!(!content.contains("image.png"));

        let makefile = content.find("### Makefile").unwrap();
        let app = content.find("### app.ts").unwrap();
        let main = content.find("### src/main.rs").unwrap();
        assert!(makefile < app && app < main);

        assert!(collection.directory_summary.contains("Files: 3"));
        assert!(collection.directory_summary.contains("  - src/main.rs (12 bytes)"));
    }

    #[test]
    fn test_skips_ignored_and_sensitive_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "node_modules/lib/index.js", "x");
        write(dir.path(), "Target/debug/build.rs", "x");
        write(dir.path(), ".env", "TOKEN=1");
        write(dir.path(), "server.pem", "x");
        write(dir.path(), "config/secrets.yml", "x");
        write(dir.path(), "lib.py", "print(1)");

        let collection = provider().collect(dir.path()).unwrap();
        assert_eq!(collection.file_count, 1);
        assert!(collection.review_content.contains("### lib.py"));
    }

    #[test]
    fn test_size_limits() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.rs", &"a".repeat(40));
        write(dir.path(), "b.rs", &"b".repeat(200));
        write(dir.path(), "c.rs", &"c".repeat(50));
        write(dir.path(), "d.rs", &"d".repeat(10));

        let config = FileLocalFilesConfig {
            max_file_size: 100,
            max_total_size: 80,
            ..Default::default()
        };
        let collection = LocalFileProvider::new(&config).collect(dir.path()).unwrap();

        // b is too large on its own; c would exceed the total, and collection stops there
        assert_eq!(collection.file_count, 1);
        assert_eq!(collection.total_bytes, 40);
        assert!(!collection.review_content.contains("### d.rs"));
    }

    #[cfg(unix)]
    #[test]
    fn test_skips_symlinks() {
        let outside = TempDir::new().unwrap();
        write(outside.path(), "leak.rs", "secret");

        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.rs", "fn main() {}");
        std::os::unix::fs::symlink(outside.path().join("leak.rs"), dir.path().join("link.rs"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked_dir")).unwrap();

        let collection = provider().collect(dir.path()).unwrap();
        assert_eq!(collection.file_count, 1);
        assert!(!collection.review_content.contains("secret"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        write(dir.path(), "locked/hidden.rs", "fn hidden() {}");
        write(dir.path(), "z.rs", "fn z() {}");
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Permission bits do not bind privileged users
        let denied = fs::read_dir(&locked).is_err();

        let collection = provider().collect(dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let collection = collection.unwrap();
        assert!(collection.review_content.contains("### a.rs"));
        assert!(collection.review_content.contains("### z.rs"));
        if denied {
            assert_eq!(collection.file_count, 2);
            assert!(!collection.review_content.contains("hidden"));
        }
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let collection = provider().collect(dir.path()).unwrap();
        assert!(collection.is_empty());
        assert!(collection.directory_summary.starts_with("No source files found in:"));
        assert_eq!(collection.instruction_content(), "(no source files found)");
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            provider().collect(&missing),
            Err(SourceCollectionError::NotFound(_))
        ));

        write(dir.path(), "file.rs", "x");
        assert!(matches!(
            provider().collect(&dir.path().join("file.rs")),
            Err(SourceCollectionError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_language_mapping() {
        assert_eq!(language_for("mjs"), "javascript");
        assert_eq!(language_for("psm1"), "powershell");
        assert_eq!(language_for("go"), "go");
    }
}
