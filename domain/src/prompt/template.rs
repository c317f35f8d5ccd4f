//! Prompt templates for review sessions
//!
//! The output format section is the contract between the agents and the
//! finding merger: every finding is a numbered `###` header followed by a
//! table whose **Priority** / **Summary** / **Location** rows feed the
//! deduplication key.

/// Placeholder replaced with the repository or directory name in custom
/// instruction templates.
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// Table row labels the merger extracts from finding bodies.
pub const PRIORITY_LABEL: &str = "Priority";
pub const SUMMARY_LABEL: &str = "Summary";
pub const LOCATION_LABEL: &str = "Location";

/// Templates for generating prompts for review sessions
pub struct ReviewPromptTemplate;

impl ReviewPromptTemplate {
    /// Guidance line placed before the focus area list
    pub fn focus_areas_guidance() -> &'static str {
        "Review **only** from the following perspectives. Do not report findings outside of them."
    }

    /// Output format every agent must follow
    pub fn output_format() -> String {
        format!(
            r#"## Output format

Report every finding in exactly the following format. Repeat the block for each finding.

---

### [number]. [title]

| Item | Content |
|------|---------|
| **{priority}** | One of Critical / High / Medium / Low |
| **{summary}** | A short description of the problem |
| **Impact if not fixed** | What happens if the problem is left as is |
| **{location}** | File path and line numbers (e.g. `src/lib.rs` L42-50) |

**Recommendation**

How to fix it, with a before/after code example where possible.

**Effect**

What improves once the fix is applied.

---

## Priority levels
- **Critical**: security vulnerabilities, data loss, production outages. Fix immediately.
- **High**: serious bugs, performance problems, broken key features. Fix soon.
- **Medium**: code quality, maintainability, minor bugs. Plan a fix.
- **Low**: style issues and small improvements. Fix when convenient.

If there is nothing to report, answer "No findings.""#,
            priority = PRIORITY_LABEL,
            summary = SUMMARY_LABEL,
            location = LOCATION_LABEL,
        )
    }

    /// Full system prompt for an agent session
    pub fn system_prompt(
        agent_prompt: &str,
        focus_areas: &[String],
        output_constraints: Option<&str>,
        custom_instructions: &[String],
    ) -> String {
        let mut prompt = String::with_capacity(agent_prompt.len() + 2048);
        prompt.push_str(agent_prompt.trim_end());
        prompt.push_str("\n\n");

        if !focus_areas.is_empty() {
            prompt.push_str("## Review focus\n");
            prompt.push_str(Self::focus_areas_guidance());
            prompt.push('\n');
            for area in focus_areas {
                prompt.push_str("- ");
                prompt.push_str(area);
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt.push_str(&Self::output_format());

        if let Some(constraints) = output_constraints.filter(|c| !c.trim().is_empty()) {
            prompt.push_str("\n\n");
            prompt.push_str(constraints.trim());
        }

        for instruction in custom_instructions.iter().filter(|i| !i.trim().is_empty()) {
            prompt.push_str("\n\n");
            prompt.push_str(instruction.trim());
        }

        prompt
    }

    /// Instruction for reviewing a GitHub repository through the MCP server
    pub fn remote_instruction(repository: &str) -> String {
        format!(
            r#"Review the GitHub repository `{}`.

Use the available GitHub tools to read the repository contents, then report your findings in the required output format."#,
            repository
        )
    }

    /// Instruction for reviewing pre-collected local sources
    pub fn local_instruction(target: &str, source_content: &str) -> String {
        format!(
            r#"Review the local project `{}`.

The source code of the target directory follows. Read it, then start the review.

{}

Based on the source code above, return your review in the required output format."#,
            target, source_content
        )
    }

    /// Expand a custom instruction template
    pub fn render_custom(template: &str, target: &str) -> String {
        template.replace(TARGET_PLACEHOLDER, target)
    }
}
