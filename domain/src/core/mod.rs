//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`]: available review models (Claude, GPT, Gemini, etc.)
//! - [`error::DomainError`]: domain-level errors
//! - [`string`]: UTF-8 safe string helpers

pub mod error;
pub mod model;
pub mod string;
