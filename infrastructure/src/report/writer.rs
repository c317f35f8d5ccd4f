//! Markdown report writer
//!
//! One file per agent result (`<agent>_<date>.md`) plus a run summary
//! (`summary_<date>.md`). The output directory is created on demand.

use chrono::Local;
use reviewer_domain::ReviewResult;
use reviewer_domain::core::string::truncate;
use std::fmt::Write as _;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Longer error messages are cut in the summary table; the agent report keeps them whole.
const MAX_ERROR_CELL_LEN: usize = 200;

/// Errors raised while writing reports
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid report name '{0}'")]
    InvalidName(String),
}

/// Writes review results as markdown files
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_directory: PathBuf,
}

/// File-name-safe form of an agent name.
fn safe_file_stem(name: &str) -> Result<String, ReportError> {
    let stem = name.trim().replace(['/', '\\'], "_");
    let mut components = Path::new(&stem).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain {
        return Err(ReportError::InvalidName(name.to_string()));
    }
    Ok(stem)
}

/// Table cells cannot hold pipes or line breaks.
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

impl ReportWriter {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    fn ensure_output_directory(&self) -> Result<(), ReportError> {
        fs::create_dir_all(&self.output_directory).map_err(|source| ReportError::Io {
            path: self.output_directory.clone(),
            source,
        })?;
        debug!("Ensured output directory exists: {}", self.output_directory.display());
        Ok(())
    }

    fn write_file(&self, file_name: &str, content: &str) -> Result<PathBuf, ReportError> {
        self.ensure_output_directory()?;
        let path = self.output_directory.join(file_name);
        fs::write(&path, content).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
        info!("Generated report: {}", path.display());
        Ok(path)
    }

    /// Render one agent's report.
    pub fn render_report(result: &ReviewResult) -> String {
        let mut report = String::new();
        let _ = writeln!(report, "# {} Review Report\n", result.agent().display_name);
        let _ = writeln!(report, "- **Target**: {}", result.target());
        let _ = writeln!(
            report,
            "- **Date**: {}\n\n---\n",
            result.timestamp().format(DATE_FORMAT)
        );
        match result.content().filter(|_| result.is_success()) {
            Some(content) => report.push_str(content.trim_end()),
            None => {
                let _ = write!(
                    report,
                    "**Review failed**\n\nError: {}",
                    result.error_message().unwrap_or("unknown error")
                );
            }
        }
        report.push('\n');
        report
    }

    /// Render the run summary table.
    pub fn render_summary(results: &[ReviewResult]) -> String {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let target = results.first().map(|r| r.target()).unwrap_or("-");

        let mut summary = String::from("# Review Summary\n\n");
        let _ = writeln!(summary, "- **Target**: {}", target);
        let _ = writeln!(summary, "- **Date**: {}", Local::now().format(DATE_FORMAT));
        let _ = writeln!(
            summary,
            "- **Agents**: {} ({} succeeded, {} failed)\n",
            results.len(),
            succeeded,
            results.len() - succeeded
        );
        summary.push_str("| Agent | Status | Error |\n|-------|--------|-------|\n");
        for result in results {
            let status = if result.is_success() { "Success" } else { "Failed" };
            let _ = writeln!(
                summary,
                "| {} | {} | {} |",
                table_cell(&result.agent().display_name),
                status,
                table_cell(&truncate(result.error_message().unwrap_or(""), MAX_ERROR_CELL_LEN))
            );
        }
        summary
    }

    /// Write the report of one result.
    pub fn write_report(&self, result: &ReviewResult) -> Result<PathBuf, ReportError> {
        let stem = safe_file_stem(&result.agent().name)?;
        let file_name = format!("{}_{}.md", stem, result.timestamp().format(DATE_FORMAT));
        self.write_file(&file_name, &Self::render_report(result))
    }

    /// Write every result's report; failures are logged and skipped.
    pub fn write_reports(&self, results: &[ReviewResult]) -> Vec<PathBuf> {
        results
            .iter()
            .filter_map(|result| match self.write_report(result) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Failed to write report for {}: {}", result.agent().name, e);
                    None
                }
            })
            .collect()
    }

    /// Write the run summary.
    pub fn write_summary(&self, results: &[ReviewResult]) -> Result<PathBuf, ReportError> {
        let file_name = format!("summary_{}.md", Local::now().format(DATE_FORMAT));
        self.write_file(&file_name, &Self::render_summary(results))
    }
}
