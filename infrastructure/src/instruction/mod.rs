//! Custom instructions: safety screening and prompt files

mod prompts;
mod safety;

pub use prompts::{PROMPTS_DIRECTORY, PromptFile, load_prompt_files};
pub use safety::{MAX_INSTRUCTION_CHARS, UnsafeInstruction, normalize, validate_instruction};
