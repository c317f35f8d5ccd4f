//! Screening of user-supplied instructions before they reach a system prompt
//!
//! Text is normalized first (NFKC, invisible format and control characters
//! removed, whitespace collapsed) so look-alike or zero-width obfuscation
//! does not hide an injection phrase.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Largest accepted instruction, in characters.
pub const MAX_INSTRUCTION_CHARS: usize = 32 * 1024;

static INVISIBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[[\p{Cf}\p{Cc}]&&[^\s]]").expect("invisible character pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

const INJECTION_PATTERNS: &[&str] = &[
    r"ignore\s+(all\s+)?(previous|prior|above)\s+instructions?",
    r"disregard\s+(all\s+)?(previous|prior|above)",
    r"forget\s+(all\s+)?(previous|prior)\s+instructions?",
    r"(ignore|forget|discard)\s+(the\s+)?(rules|guardrails|policy|constraints)",
    r"(bypass|disable|turn\s+off)\s+(the\s+)?(safety|guardrails|restrictions)",
    r"(override|replace)\s+(the\s+)?(system|developer)\s+prompt",
    r"(you\s+are\s+now|act\s+as\s+if\s+you\s+are)",
    r"(follow\s+only|prioritize\s+only)\s+(the\s+)?(next|following)\s+instructions?",
    r"(以下|上記|これまで|前|以前)\s*の?\s*指示\s*を\s*無視",
    r"(ルール|方針|制約)\s*を\s*(忘れて|無視して)",
    r"システム\s*プロンプト\s*(を)?\s*(上書き|無視|無効化)",
    r"(모든|이전)\s*지시\s*(를)?\s*무시",
    r"(忽略|无视)\s*(所有)?\s*(之前|以上)\s*的?\s*指[示令]",
];

static INJECTION: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = INJECTION_PATTERNS
        .iter()
        .map(|p| format!("(?:{})", p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){}", alternation)).expect("injection patterns are valid")
});

/// Why an instruction was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnsafeInstruction {
    #[error("size limit exceeded ({chars} characters, limit {limit})")]
    TooLarge { chars: usize, limit: usize },

    #[error("potential prompt-injection pattern: '{0}'")]
    Injection(String),
}

/// Canonical form the injection patterns are matched against.
pub fn normalize(text: &str) -> String {
    let composed: String = text.nfkc().collect();
    let visible = INVISIBLE.replace_all(&composed, "");
    WHITESPACE.replace_all(&visible, " ").trim().to_string()
}

/// Accept or reject one instruction. Blank text is accepted.
pub fn validate_instruction(text: &str) -> Result<(), UnsafeInstruction> {
    let chars = text.chars().count();
    if chars > MAX_INSTRUCTION_CHARS {
        return Err(UnsafeInstruction::TooLarge {
            chars,
            limit: MAX_INSTRUCTION_CHARS,
        });
    }
    if text.trim().is_empty() {
        return Ok(());
    }

    let normalized = normalize(text);
    match INJECTION.find(&normalized) {
        Some(found) => Err(UnsafeInstruction::Injection(found.as_str().to_string())),
        None => Ok(()),
    }
}
