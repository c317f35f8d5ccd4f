//! Infrastructure layer for multi-reviewer
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the Copilot CLI session gateway, the local source
//! provider, configuration, agent and skill file loading, custom
//! instruction screening, and report output.

pub mod agents;
pub mod config;
pub mod copilot;
pub mod instruction;
pub mod local;
pub mod markdown;
pub mod report;
pub mod skills;

// Re-export commonly used types
pub use agents::{AgentLoadError, AgentLoader};
pub use config::{ConfigIssue, ConfigLoader, FileConfig, Severity};
pub use copilot::{
    error::{CopilotError, Result},
    gateway::CopilotSessionGateway,
    router::MessageRouter,
    session::CopilotSession,
};
pub use instruction::{PromptFile, UnsafeInstruction, load_prompt_files, validate_instruction};
pub use local::LocalFileProvider;
pub use report::{ReportError, ReportWriter};
pub use skills::{SkillLoadError, SkillLoader};
