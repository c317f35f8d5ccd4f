//! Use cases (application services)

pub mod run_review;
pub mod run_skill;
