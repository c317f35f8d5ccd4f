//! Streaming events for review sessions.
//!
//! [`StreamEvent`] bridges the transport's streamed notifications
//! (`assistant.message.delta`, `assistant.message`, `session.error`) to the
//! application layer, where fragments are fed into a content accumulator.

/// An event in a streaming review response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment from the model.
    Delta(String),
    /// The complete response text (signals stream end).
    Completed(String),
    /// An error reported by the session.
    Error(String),
}

impl StreamEvent {
    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Delta(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!StreamEvent::Delta("x".into()).is_terminal());
        assert!(StreamEvent::Completed(String::new()).is_terminal());
        assert!(StreamEvent::Error("boom".into()).is_terminal());
    }
}
