//! Application layer for multi-reviewer
//!
//! This crate contains the review run and skill run use cases, port definitions, and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{ExecutionParams, ExecutionParamsError, ExecutionStrategy};
pub use ports::{
    progress::{NoProgress, ReviewProgressNotifier},
    session_gateway::{
        GatewayError, McpServerConfig, McpServers, ReviewSession, SessionConfig, SessionGateway,
        StreamHandle,
    },
    source_provider::{SourceCollection, SourceCollectionError, SourceContentProvider},
};
pub use use_cases::run_review::{
    PromptOptions, ReviewOrchestrator, RunReviewError, RunReviewInput,
    attempt::AttemptError,
    context::ReviewContext,
    executor::TaskOutcome,
};
pub use use_cases::run_skill::{
    DEFAULT_SKILL_TIMEOUT, RunSkillError, RunSkillInput, RunSkillUseCase, SkillCatalog, SkillEntry,
};
