//! Model value object representing an LLM model

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Reasoning effort attached to sessions that run on reasoning models.
pub const DEFAULT_REASONING_EFFORT: &str = "high";

/// Available review models (Value Object)
///
/// Known Copilot model identifiers, plus `Custom` for anything else the
/// Copilot CLI accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Model {
    // Claude models
    ClaudeSonnet46,
    ClaudeOpus46,
    ClaudeSonnet45,
    ClaudeHaiku45,
    ClaudeOpus45,
    ClaudeSonnet4,
    // GPT models
    Gpt52Codex,
    Gpt51Codex,
    Gpt52,
    Gpt5,
    Gpt41,
    // Gemini models
    Gemini3Pro,
    // Custom
    Custom(String),
}

impl Model {
    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        match self {
            Model::ClaudeSonnet46 => "claude-sonnet-4.6",
            Model::ClaudeOpus46 => "claude-opus-4.6",
            Model::ClaudeSonnet45 => "claude-sonnet-4.5",
            Model::ClaudeHaiku45 => "claude-haiku-4.5",
            Model::ClaudeOpus45 => "claude-opus-4.5",
            Model::ClaudeSonnet4 => "claude-sonnet-4",
            Model::Gpt52Codex => "gpt-5.2-codex",
            Model::Gpt51Codex => "gpt-5.1-codex",
            Model::Gpt52 => "gpt-5.2",
            Model::Gpt5 => "gpt-5",
            Model::Gpt41 => "gpt-4.1",
            Model::Gemini3Pro => "gemini-3-pro-preview",
            Model::Custom(s) => s,
        }
    }

    /// Check if this model reasons before answering and therefore accepts a
    /// reasoning effort setting (Opus family, `o3*`, `o4-mini*`).
    pub fn is_reasoning(&self) -> bool {
        let id = self.as_str().to_ascii_lowercase();
        id.contains("opus") || id.starts_with("o3") || id.starts_with("o4-mini")
    }

    /// Reasoning effort to request for this model, if it is a reasoning model.
    ///
    /// An explicit, non-blank `configured` value wins over the default.
    pub fn reasoning_effort<'a>(&self, configured: Option<&'a str>) -> Option<&'a str> {
        if !self.is_reasoning() {
            return None;
        }
        match configured {
            Some(effort) if !effort.trim().is_empty() => Some(effort),
            _ => Some(DEFAULT_REASONING_EFFORT),
        }
    }
}

impl Default for Model {
    /// Returns the default review model (Claude Sonnet 4)
    fn default() -> Self {
        Model::ClaudeSonnet4
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "claude-sonnet-4.6" => Model::ClaudeSonnet46,
            "claude-opus-4.6" => Model::ClaudeOpus46,
            "claude-sonnet-4.5" => Model::ClaudeSonnet45,
            "claude-haiku-4.5" => Model::ClaudeHaiku45,
            "claude-opus-4.5" => Model::ClaudeOpus45,
            "claude-sonnet-4" => Model::ClaudeSonnet4,
            "gpt-5.2-codex" => Model::Gpt52Codex,
            "gpt-5.1-codex" => Model::Gpt51Codex,
            "gpt-5.2" => Model::Gpt52,
            "gpt-5" => Model::Gpt5,
            "gpt-4.1" => Model::Gpt41,
            "gemini-3-pro-preview" => Model::Gemini3Pro,
            other => Model::Custom(other.to_string()),
        })
    }
}

impl From<&str> for Model {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(model) => model,
            Err(never) => match never {},
        }
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Model::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_roundtrip() {
        for model in [Model::ClaudeSonnet4, Model::Gpt52Codex, Model::Gemini3Pro] {
            let parsed = Model::from(model.to_string().as_str());
            assert_eq!(model, parsed);
        }
    }

    #[test]
    fn test_custom_model() {
        let model = Model::from("custom-model-v1");
        assert_eq!(model, Model::Custom("custom-model-v1".to_string()));
        assert_eq!(model.to_string(), "custom-model-v1");
    }

    #[test]
    fn test_reasoning_detection() {
        assert!(Model::ClaudeOpus46.is_reasoning());
        assert!(Model::from("claude-opus-4.6-fast").is_reasoning());
        assert!(Model::from("Claude-Opus-4.5").is_reasoning());
        assert!(Model::from("o3-mini").is_reasoning());
        assert!(Model::from("o4-mini").is_reasoning());
        assert!(!Model::ClaudeSonnet4.is_reasoning());
        assert!(!Model::from("gpt-4o").is_reasoning());
        assert!(!Model::from("GPT-5.2-Codex").is_reasoning());
    }

    #[test]
    fn test_reasoning_effort_resolution() {
        assert_eq!(Model::ClaudeSonnet4.reasoning_effort(Some("low")), None);
        assert_eq!(Model::ClaudeOpus46.reasoning_effort(None), Some("high"));
        assert_eq!(Model::ClaudeOpus46.reasoning_effort(Some("  ")), Some("high"));
        assert_eq!(Model::ClaudeOpus46.reasoning_effort(Some("low")), Some("low"));
    }

    #[test]
    fn test_model_default() {
        assert_eq!(Model::default(), Model::ClaudeSonnet4);
    }
}
