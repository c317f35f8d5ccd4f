//! Agent definition loading

mod loader;

pub use loader::{AgentLoadError, AgentLoader};
