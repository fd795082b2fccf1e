//! # agentfeed-stream
//!
//! Decoding and reduction for multi-agent response streams.
//!
//! A research backend answers a chat message with a chunked body of
//! newline-delimited JSON objects describing an in-progress multi-agent
//! pipeline. This crate turns those bytes into typed events and folds the
//! events into display state. It performs no I/O.
//!
//! ## Core Concepts
//!
//! - **[`LineFramer`] / [`LineStream`]**: reassemble complete lines from arbitrary chunks
//! - **[`classify`] / [`EventDecoder`] / [`EventStream`]**: ordered-precedence line classification
//! - **[`StreamEvent`]**: the closed set of decoded events
//! - **[`AgentTimeline`]**: monotonic per-agent progress reducer
//! - **[`AnswerBuffer`]**: token concatenation
//!
//! ## Example
//!
//! ```ignore
//! use agentfeed_stream::{AgentTimeline, AnswerBuffer, EventStream, LineStream};
//! use futures::StreamExt;
//!
//! let mut events = EventStream::new(LineStream::new(response.bytes_stream()));
//! let mut timeline = AgentTimeline::new();
//! let mut answer = AnswerBuffer::new();
//!
//! while let Some(event) = events.next().await {
//!     let event = event?;
//!     timeline.apply(&event);
//!     answer.apply(&event);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod answer;
pub mod decode;
pub mod error;
pub mod events;
pub mod framing;
pub mod timeline;

// Re-exports
pub use answer::{accumulate, AnswerBuffer};
pub use decode::{classify, DecodeStats, EventDecoder, EventStream, MISSING_MESSAGE_ID};
pub use error::{StreamError, StreamResult};
pub use events::{
    StreamEvent, TimelinePhase, DECOMPOSITION_AGENT, SYNTHESIS_AGENT, UNKNOWN_AGENT,
};
pub use framing::{LineFramer, LineStream, DEFAULT_MAX_LINE_BYTES};
pub use timeline::{reduce, AgentEntry, AgentStatus, AgentTimeline};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        AgentStatus, AgentTimeline, AnswerBuffer, DecodeStats, EventDecoder, EventStream,
        LineFramer, LineStream, StreamError, StreamEvent, StreamResult, TimelinePhase,
    };
}
