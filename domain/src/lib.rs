//! Domain layer for multi-reviewer
//!
//! This crate contains the core review vocabulary. It has no dependencies on
//! infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! - **Agent**: a named review perspective (model, system prompt, focus areas)
//! - **Pass**: one full repetition of an agent's review of the same target
//! - **Finding**: one `### <n>. <title>` block extracted from review output
//! - **Merge**: per-agent consolidation of several passes into one
//!   deduplicated result
//! - **Skill**: a parameterized prompt attached to agents, run on its own

pub mod agent;
pub mod core;
pub mod prompt;
pub mod review;
pub mod session;
pub mod skill;
pub mod target;

// Re-export commonly used types
pub use agent::{AgentConfig, AgentIdentity, AgentTask};
pub use core::{
    error::DomainError,
    model::{DEFAULT_REASONING_EFFORT, Model},
};
pub use prompt::ReviewPromptTemplate;
pub use review::{Finding, FindingKey, ReviewResult, merge_by_agent};
pub use session::StreamEvent;
pub use skill::{SkillDefinition, SkillError, SkillParameter};
pub use target::ReviewTarget;
