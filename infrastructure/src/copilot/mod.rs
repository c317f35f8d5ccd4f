//! Copilot CLI adapter
//!
//! Implements [`SessionGateway`](reviewer_application::SessionGateway) for the
//! GitHub Copilot CLI running in server mode.

pub mod error;
pub mod gateway;
pub mod protocol;
pub mod router;
pub mod session;
pub mod transport;

pub use gateway::CopilotSessionGateway;
