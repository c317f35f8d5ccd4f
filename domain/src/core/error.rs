//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid agent configuration: {0}")]
    InvalidAgent(String),

    #[error("Invalid review target: {0}")]
    InvalidTarget(String),

    #[error("Agent returned empty review content")]
    EmptyContent,
}
