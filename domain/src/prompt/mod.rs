//! Prompt text assembly for review sessions.

pub mod template;

pub use template::ReviewPromptTemplate;
