//! Agent domain module
//!
//! Review agent definitions and the (agent, pass) work units derived from
//! them.

pub mod config;
pub mod task;

pub use config::{AgentConfig, AgentIdentity};
pub use task::AgentTask;
