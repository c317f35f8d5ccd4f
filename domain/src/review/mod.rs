//! Review results and multi-pass merging

pub mod finding;
pub mod merger;
pub mod result;

pub use finding::{Finding, FindingKey};
pub use merger::merge_by_agent;
pub use result::ReviewResult;
