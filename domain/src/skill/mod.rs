//! Skill domain module
//!
//! A skill is a reusable, parameterized prompt attached to one or more
//! agents. It runs as a single exchange outside of a review run.

mod definition;

pub use definition::{SKILL_AGENT_METADATA_KEY, SkillDefinition, SkillError, SkillParameter};
