//! Markdown files with a YAML frontmatter header
//!
//! Shared by agent definitions (`*.agent.md`), skills (`SKILL.md`,
//! `*.skill.md`) and prompt files (`*.prompt.md`).

mod frontmatter;

pub use frontmatter::{FrontmatterError, parse_frontmatter, scalar_to_string, split_frontmatter};
