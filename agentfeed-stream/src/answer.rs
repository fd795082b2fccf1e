//! Answer text accumulation.

use crate::events::StreamEvent;

/// Accumulates token deltas into the answer text.
///
/// Deltas are appended verbatim in arrival order: no trimming, no
/// normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerBuffer {
    text: String,
    tokens: usize,
}

impl AnswerBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token delta. Non-token events are ignored.
    ///
    /// Returns `true` if this was the first token, which is the signal that
    /// ends the "thinking" display state.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event.as_token() {
            Some(delta) => self.push(delta),
            None => false,
        }
    }

    /// Append raw text. Returns `true` if this was the first token.
    pub fn push(&mut self, delta: &str) -> bool {
        self.text.push_str(delta);
        self.tokens += 1;
        self.tokens == 1
    }

    /// The accumulated text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of token deltas applied.
    pub fn token_count(&self) -> usize {
        self.tokens
    }

    /// Check if no token has been applied.
    pub fn is_empty(&self) -> bool {
        self.tokens == 0
    }

    /// Take the text out, leaving the buffer empty.
    pub fn take(&mut self) -> String {
        self.tokens = 0;
        std::mem::take(&mut self.text)
    }

    /// Discard the accumulated text.
    pub fn clear(&mut self) {
        self.text.clear();
        self.tokens = 0;
    }
}

/// Pure reducer: `(text, event) → text`.
#[must_use]
pub fn accumulate(mut text: String, event: &StreamEvent) -> String {
    if let Some(delta) = event.as_token() {
        text.push_str(delta);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TimelinePhase;

    #[test]
    fn test_concatenates_in_order() {
        let deltas = ["Hel", "lo", " ", "wörld", "\n", "  ", "🙂"];
        let events: Vec<StreamEvent> = deltas.iter().map(|d| StreamEvent::token(*d)).collect();

        let text = events.iter().fold(String::new(), accumulate);
        assert_eq!(text, deltas.concat());
    }

    #[test]
    fn test_first_token_flag() {
        let mut buffer = AnswerBuffer::new();
        assert!(buffer.is_empty());
        assert!(buffer.apply(&StreamEvent::token("a")));
        assert!(!buffer.apply(&StreamEvent::token("b")));
        assert_eq!(buffer.text(), "ab");
        assert_eq!(buffer.token_count(), 2);
    }

    #[test]
    fn test_empty_delta_still_counts_as_first_token() {
        let mut buffer = AnswerBuffer::new();
        assert!(buffer.push(""));
        assert_eq!(buffer.text(), "");
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_ignores_other_events() {
        let mut buffer = AnswerBuffer::new();
        assert!(!buffer.apply(&StreamEvent::thinking("hm")));
        assert!(!buffer.apply(&StreamEvent::timeline("a", TimelinePhase::AgentStart)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_resets() {
        let mut buffer = AnswerBuffer::new();
        buffer.push("x");
        assert_eq!(buffer.take(), "x");
        assert!(buffer.is_empty());
        assert!(buffer.push("y"));
    }
}
