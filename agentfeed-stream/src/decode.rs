//! Line classification.
//!
//! Payloads on the wire are not cleanly discriminated: legacy and current
//! shapes coexist (`{"delta": ..}` next to `{"type":"token","delta": ..}`,
//! `{"event": ..}` next to `{"type":"timeline", ..}`). [`classify`] resolves
//! them with a fixed precedence where the first matching rule wins:
//!
//! 1. `type == "thinking"` → [`StreamEvent::Thinking`]
//! 2. `type == "routing"` → [`StreamEvent::Routing`]
//! 3. `type == "timeline"` or an `event` field → [`StreamEvent::Timeline`]
//! 4. `type == "data_source_used"` → [`StreamEvent::DataSourceUsed`]
//! 5. a `delta` field (with or without `type == "token"`) → [`StreamEvent::Token`]
//! 6. truthy `report_ready` → [`StreamEvent::ReportReady`]
//! 7. truthy `final` → [`StreamEvent::Final`], or an error when `message_id` is missing or empty
//! 8. an `error` field → [`StreamEvent::Error`]
//! 9. anything else is dropped
//!
//! Lines that are not JSON objects are dropped as well.

use crate::error::StreamResult;
use crate::events::{StreamEvent, TimelinePhase, UNKNOWN_AGENT};
use futures::Stream;
use pin_project_lite::pin_project;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Message used when a final event carries no message id.
pub const MISSING_MESSAGE_ID: &str = "missing message id";

/// Classify one parsed JSON value.
///
/// Returns `None` for shapes this client does not recognize.
pub fn classify(value: &JsonValue) -> Option<StreamEvent> {
    let obj = value.as_object()?;
    let kind = obj.get("type").and_then(JsonValue::as_str);

    if kind == Some("thinking") {
        return Some(StreamEvent::Thinking {
            message: string_field(obj, "message").unwrap_or_default(),
        });
    }

    if kind == Some("routing") {
        return Some(StreamEvent::Routing {
            mode: string_field(obj, "mode").unwrap_or_default(),
            reason: string_field(obj, "reason"),
        });
    }

    if kind == Some("timeline") || obj.contains_key("event") {
        let phase = match obj.get("event") {
            Some(JsonValue::String(name)) => TimelinePhase::parse(name),
            Some(other) => TimelinePhase::Other(other.to_string()),
            None => TimelinePhase::Other(String::new()),
        };
        return Some(StreamEvent::Timeline {
            agent_id: string_field(obj, "agent").unwrap_or_else(|| UNKNOWN_AGENT.to_string()),
            phase,
            message: string_field(obj, "message"),
        });
    }

    if kind == Some("data_source_used") {
        let categories = obj
            .get("categories")
            .and_then(JsonValue::as_array)
            .map(|items| items.iter().filter_map(text_of).collect())
            .unwrap_or_default();
        return Some(StreamEvent::DataSourceUsed {
            indicator: string_field(obj, "indicator").unwrap_or_default(),
            categories,
            restriction: string_field(obj, "restriction"),
        });
    }

    if let Some(delta) = obj.get("delta") {
        return Some(StreamEvent::Token {
            delta: delta_text(delta),
        });
    }

    if obj.get("report_ready").is_some_and(is_truthy) {
        return Some(StreamEvent::ReportReady {
            data: obj.get("data").filter(|d| !d.is_null()).cloned(),
        });
    }

    if obj.get("final").is_some_and(is_truthy) {
        let message_id = obj
            .get("message_id")
            .and_then(text_of)
            .filter(|id| !id.is_empty());
        return Some(match message_id {
            Some(message_id) => StreamEvent::Final { message_id },
            None => StreamEvent::error(MISSING_MESSAGE_ID),
        });
    }

    if let Some(error) = obj.get("error") {
        return Some(StreamEvent::Error {
            message: error_message(error),
        });
    }

    None
}

/// JavaScript-style truthiness for flag fields.
fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

/// Text of a scalar value. Numbers are stringified, everything else is `None`.
fn text_of(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Text of a `delta` value. `null` is empty; other non-strings use their JSON text.
fn delta_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_field(obj: &Map<String, JsonValue>, key: &str) -> Option<String> {
    obj.get(key).and_then(text_of)
}

fn error_message(error: &JsonValue) -> String {
    match error {
        JsonValue::String(s) => s.clone(),
        JsonValue::Object(inner) => string_field(inner, "message")
            .or_else(|| string_field(inner, "detail"))
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

/// Counters for lines seen by a decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStats {
    /// Lines inspected.
    pub lines: u64,
    /// Blank or whitespace-only lines skipped.
    pub blank: u64,
    /// Lines that were not valid JSON.
    pub malformed: u64,
    /// Valid JSON with no recognized shape.
    pub unrecognized: u64,
    /// Events produced.
    pub events: u64,
}

impl DecodeStats {
    /// Lines dropped for any reason other than being blank.
    pub fn dropped(&self) -> u64 {
        self.malformed + self.unrecognized
    }
}

/// Stateful line decoder that keeps [`DecodeStats`].
#[derive(Debug, Default)]
pub struct EventDecoder {
    stats: DecodeStats,
}

impl EventDecoder {
    /// Create a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one line. Dropped lines yield `None` and only touch the counters.
    pub fn decode(&mut self, line: &str) -> Option<StreamEvent> {
        self.stats.lines += 1;

        if line.trim().is_empty() {
            self.stats.blank += 1;
            return None;
        }

        let value: JsonValue = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                self.stats.malformed += 1;
                tracing::trace!(error = %e, line = %line, "dropping malformed line");
                return None;
            }
        };

        match classify(&value) {
            Some(event) => {
                self.stats.events += 1;
                Some(event)
            }
            None => {
                self.stats.unrecognized += 1;
                tracing::trace!(line = %line, "dropping unrecognized event shape");
                None
            }
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> DecodeStats {
        self.stats
    }
}

pin_project! {
    /// Stream adapter that decodes a line stream into events.
    ///
    /// Dropped lines are skipped; framing errors pass through.
    pub struct EventStream<S> {
        #[pin]
        inner: S,
        decoder: EventDecoder,
    }
}

impl<S> EventStream<S> {
    /// Create a new event stream over a line stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: EventDecoder::new(),
        }
    }

    /// Decoder counters so far.
    pub fn stats(&self) -> DecodeStats {
        self.decoder.stats()
    }
}

impl<S> Stream for EventStream<S>
where
    S: Stream<Item = StreamResult<String>>,
{
    type Item = StreamResult<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(line)) => {
                    if let Some(event) = this.decoder.decode(&line) {
                        return Poll::Ready(Some(Ok(event)));
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => return Poll::Ready(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::LineStream;
    use futures::{stream, StreamExt};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn decode(line: &str) -> Option<StreamEvent> {
        EventDecoder::new().decode(line)
    }

    #[test]
    fn test_thinking() {
        assert_eq!(
            decode(r#"{"type":"thinking","message":"PHI check: none"}"#),
            Some(StreamEvent::thinking("PHI check: none"))
        );
    }

    #[test]
    fn test_routing() {
        assert_eq!(
            decode(r#"{"type":"routing","mode":"multi_agent","reason":"broad question"}"#),
            Some(StreamEvent::Routing {
                mode: "multi_agent".to_string(),
                reason: Some("broad question".to_string()),
            })
        );
    }

    #[test]
    fn test_timeline_from_event_field() {
        assert_eq!(
            decode(r#"{"event":"agent_start","agent":"market","message":"Searching"}"#),
            Some(StreamEvent::Timeline {
                agent_id: "market".to_string(),
                phase: TimelinePhase::AgentStart,
                message: Some("Searching".to_string()),
            })
        );
    }

    #[test]
    fn test_timeline_defaults_agent_to_unknown() {
        assert_eq!(
            decode(r#"{"type":"timeline","event":"agent_progress"}"#),
            Some(StreamEvent::timeline(UNKNOWN_AGENT, TimelinePhase::AgentProgress))
        );
    }

    #[test]
    fn test_timeline_with_unknown_phase() {
        let event = decode(r#"{"event":"agent_paused","agent":"x"}"#).unwrap();
        assert!(matches!(
            event,
            StreamEvent::Timeline { phase: TimelinePhase::Other(ref p), .. } if p == "agent_paused"
        ));
    }

    #[test]
    fn test_data_source_used() {
        assert_eq!(
            decode(
                r#"{"type":"data_source_used","indicator":"internal","categories":["sales","ops"],"restriction":"no_phi"}"#
            ),
            Some(StreamEvent::DataSourceUsed {
                indicator: "internal".to_string(),
                categories: vec!["sales".to_string(), "ops".to_string()],
                restriction: Some("no_phi".to_string()),
            })
        );
    }

    #[rstest]
    #[case(r#"{"type":"token","delta":"Hello "}"#, "Hello ")]
    #[case(r#"{"delta":"legacy"}"#, "legacy")]
    #[case(r#"{"delta":""}"#, "")]
    #[case(r#"{"delta":"  spaced\n"}"#, "  spaced\n")]
    #[case(r#"{"type":"token","delta":42}"#, "42")]
    #[case(r#"{"delta":1.5}"#, "1.5")]
    #[case(r#"{"delta":null}"#, "")]
    fn test_token_shapes(#[case] line: &str, #[case] expected: &str) {
        assert_eq!(decode(line), Some(StreamEvent::token(expected)));
    }

    #[test]
    fn test_token_without_delta_is_dropped() {
        assert_eq!(decode(r#"{"type":"token"}"#), None);
    }

    #[test]
    fn test_report_ready() {
        assert_eq!(
            decode(r#"{"report_ready":true,"data":{"title":"Q3"}}"#),
            Some(StreamEvent::ReportReady {
                data: Some(json!({"title": "Q3"})),
            })
        );
        assert_eq!(
            decode(r#"{"report_ready":1}"#),
            Some(StreamEvent::ReportReady { data: None })
        );
    }

    #[test]
    fn test_final() {
        assert_eq!(
            decode(r#"{"final":true,"message_id":"m1"}"#),
            Some(StreamEvent::Final {
                message_id: "m1".to_string()
            })
        );
        assert_eq!(
            decode(r#"{"final":true,"message_id":42}"#),
            Some(StreamEvent::Final {
                message_id: "42".to_string()
            })
        );
    }

    #[rstest]
    #[case(r#"{"final":true}"#)]
    #[case(r#"{"final":true,"message_id":""}"#)]
    #[case(r#"{"final":true,"message_id":null}"#)]
    fn test_final_without_message_id_is_error(#[case] line: &str) {
        assert_eq!(decode(line), Some(StreamEvent::error(MISSING_MESSAGE_ID)));
    }

    #[rstest]
    #[case(r#"{"error":"upstream timeout"}"#, "upstream timeout")]
    #[case(r#"{"error":{"message":"quota"}}"#, "quota")]
    #[case(r#"{"error":true}"#, "true")]
    fn test_error_shapes(#[case] line: &str, #[case] expected: &str) {
        assert_eq!(decode(line), Some(StreamEvent::error(expected)));
    }

    #[rstest]
    #[case(r#"{"final":false,"message_id":"m1"}"#)]
    #[case(r#"{"report_ready":false}"#)]
    #[case(r#"{"report_ready":""}"#)]
    #[case(r#"{"type":"heartbeat"}"#)]
    #[case(r#"{}"#)]
    #[case(r#"[1,2,3]"#)]
    #[case(r#""just a string""#)]
    fn test_unrecognized_shapes_are_dropped(#[case] line: &str) {
        let mut decoder = EventDecoder::new();
        assert_eq!(decoder.decode(line), None);
        assert_eq!(decoder.stats().unrecognized, 1);
    }

    #[rstest]
    #[case("not json")]
    #[case("{\"type\":\"token\",\"delta\":")]
    #[case(": keep-alive")]
    fn test_malformed_lines_are_dropped(#[case] line: &str) {
        let mut decoder = EventDecoder::new();
        assert_eq!(decoder.decode(line), None);
        assert_eq!(decoder.stats().malformed, 1);
        assert_eq!(decoder.stats().events, 0);
    }

    #[test]
    fn test_blank_lines_are_counted_separately() {
        let mut decoder = EventDecoder::new();
        assert_eq!(decoder.decode(""), None);
        assert_eq!(decoder.decode("  \r"), None);
        let stats = decoder.stats();
        assert_eq!(stats.blank, 2);
        assert_eq!(stats.dropped(), 0);
    }

    #[test]
    fn test_trailing_carriage_return_is_tolerated() {
        assert_eq!(
            decode("{\"delta\":\"x\"}\r"),
            Some(StreamEvent::token("x"))
        );
    }

    // Precedence: the earliest rule wins when a payload matches several.

    #[test]
    fn test_thinking_beats_delta() {
        assert_eq!(
            decode(r#"{"type":"thinking","message":"m","delta":"d"}"#),
            Some(StreamEvent::thinking("m"))
        );
    }

    #[test]
    fn test_event_field_beats_token_type() {
        let event = decode(r#"{"type":"token","event":"agent_start","agent":"a","delta":"d"}"#);
        assert!(matches!(event, Some(StreamEvent::Timeline { .. })));
    }

    #[test]
    fn test_data_source_beats_delta() {
        let event = decode(r#"{"type":"data_source_used","indicator":"web","delta":"d"}"#);
        assert!(matches!(event, Some(StreamEvent::DataSourceUsed { .. })));
    }

    #[test]
    fn test_delta_beats_final() {
        assert_eq!(
            decode(r#"{"delta":"tail","final":true,"message_id":"m1"}"#),
            Some(StreamEvent::token("tail"))
        );
    }

    #[test]
    fn test_non_string_delta_beats_final() {
        assert_eq!(
            decode(r#"{"delta":null,"final":true,"message_id":"m1"}"#),
            Some(StreamEvent::token(""))
        );
    }

    #[test]
    fn test_non_string_delta_beats_report_ready() {
        assert_eq!(
            decode(r#"{"delta":false,"report_ready":true}"#),
            Some(StreamEvent::token("false"))
        );
    }

    #[test]
    fn test_report_ready_beats_final() {
        let event = decode(r#"{"report_ready":true,"final":true,"message_id":"m1"}"#);
        assert!(matches!(event, Some(StreamEvent::ReportReady { .. })));
    }

    #[test]
    fn test_final_beats_error() {
        assert_eq!(
            decode(r#"{"final":true,"message_id":"m1","error":"ignored"}"#),
            Some(StreamEvent::Final {
                message_id: "m1".to_string()
            })
        );
    }

    #[test]
    fn test_falsy_final_falls_through_to_error() {
        assert_eq!(
            decode(r#"{"final":false,"error":"bad"}"#),
            Some(StreamEvent::error("bad"))
        );
    }

    #[tokio::test]
    async fn test_event_stream_skips_dropped_lines() {
        let body = "{\"type\":\"thinking\",\"message\":\"hm\"}\n\ngarbage\n{\"unknown\":1}\n{\"delta\":\"a\"}\n";
        let chunks: Vec<Result<&[u8], std::io::Error>> =
            body.as_bytes().chunks(7).map(Ok).collect();

        let mut events = EventStream::new(LineStream::new(stream::iter(chunks)));
        let mut collected = Vec::new();
        while let Some(event) = events.next().await {
            collected.push(event.unwrap());
        }

        assert_eq!(
            collected,
            vec![StreamEvent::thinking("hm"), StreamEvent::token("a")]
        );
        let stats = events.stats();
        assert_eq!(stats.lines, 5);
        assert_eq!(stats.blank, 1);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.unrecognized, 1);
        assert_eq!(stats.events, 2);
    }
}
