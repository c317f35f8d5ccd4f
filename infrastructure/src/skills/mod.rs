//! Skill file loading

mod loader;
mod parser;

pub use loader::{SkillLoader, discover_skills};
pub use parser::{SKILL_FILE_NAME, SkillLoadError, is_skill_file, load_skill_file, parse_skill, skill_id};
