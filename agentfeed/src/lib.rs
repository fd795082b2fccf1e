//! # agentfeed - Streaming Consumer for Multi-Agent Research Chat
//!
//! A research backend answers each chat message with a chunked body of
//! newline-delimited JSON events: routing decisions, per-agent progress,
//! token deltas, data-source usage, report readiness and a final marker.
//! agentfeed turns that body into a live agent timeline, an accumulating
//! answer and a cancellable session that commits its answer exactly once.
//!
//! ## Quick Start
//!
//! ```ignore
//! use agentfeed::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::from_env()?;
//!     let store = Arc::new(InMemoryConversationStore::new());
//!     let client = ChatClient::from_config(&config, store)?;
//!
//!     let handle = client.submit(ChatRequest::new("Summarize Q3 sales")).await?;
//!     match handle.outcome().await {
//!         SessionOutcome::Finalized(message) => println!("{}", message.text),
//!         SessionOutcome::Cancelled => println!("cancelled"),
//!         SessionOutcome::Failed(e) => eprintln!("error: {e}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`agentfeed_stream`] - Line framing, event decoding, timeline and answer reducers
//! - [`agentfeed_session`] - Sessions, the HTTP transport, the client and the store seam

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Framing, decoding and reducers.
pub use agentfeed_stream as stream;

/// Sessions, transport and client.
pub use agentfeed_session as session;

// ============================================================================
// Flat Re-exports
// ============================================================================

pub use agentfeed_stream::{
    AgentStatus, AgentTimeline, AnswerBuffer, DecodeStats, EventDecoder, EventStream, LineFramer,
    LineStream, StreamError, StreamEvent, TimelinePhase,
};

pub use agentfeed_session::{
    Attachment, ChatClient, ChatRequest, ChatTransport, ClientConfig, CompletedMessage,
    ConversationStore, HttpTransport, InMemoryConversationStore, SessionConfig, SessionError,
    SessionHandle, SessionOutcome, SessionPhase, SessionResult, SessionSnapshot, StreamSession,
    TransportError,
};

/// Prelude for common imports.
///
/// ```ignore
/// use agentfeed::prelude::*;
/// ```
pub mod prelude {
    pub use agentfeed_session::prelude::*;
    pub use agentfeed_stream::prelude::*;
}
