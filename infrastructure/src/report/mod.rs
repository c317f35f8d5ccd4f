//! Markdown report output

mod writer;

pub use writer::{ReportError, ReportWriter};
