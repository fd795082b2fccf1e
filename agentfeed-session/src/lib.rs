//! # agentfeed-session
//!
//! Cancellable streaming chat sessions.
//!
//! A session submits one chat message, consumes the newline-delimited JSON
//! answer stream, and publishes render-ready [`SessionSnapshot`]s until it
//! reaches a terminal phase:
//!
//! ```text
//! Idle → Requesting → Streaming → Finalized | Cancelled | Failed
//! ```
//!
//! ## Core Concepts
//!
//! - **[`StreamSession`]**: one request/response exchange, consumed by `run`
//! - **[`ChatClient`]**: runs sessions in the background, one per conversation
//! - **[`ChatTransport`]**: opens the response body; [`HttpTransport`] posts JSON
//! - **[`ConversationStore`]**: creates conversations and commits final answers
//!
//! ## Example
//!
//! ```ignore
//! use agentfeed_session::prelude::*;
//! use std::sync::Arc;
//!
//! let config = ClientConfig::from_env()?;
//! let client = ChatClient::from_config(&config, Arc::new(InMemoryConversationStore::new()))?;
//!
//! let handle = client.submit(ChatRequest::new("How did Q3 go?")).await?;
//! let mut snapshots = handle.snapshots();
//! while snapshots.changed().await.is_ok() {
//!     let snapshot = snapshots.borrow_and_update().clone();
//!     println!("{:?}: {}", snapshot.phase, snapshot.accumulated_text);
//!     if snapshot.phase.is_terminal() {
//!         break;
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod transport;

// Re-exports
pub use client::{ChatClient, SessionHandle};
pub use config::{
    ClientConfig, SessionConfig, DEFAULT_BASE_URL, DEFAULT_COLLAPSE_DELAY, DEFAULT_STREAM_PATH,
};
pub use error::{SessionError, SessionResult, StoreError, TransportError};
pub use request::{Attachment, ChatRequest, CompletedMessage};
pub use session::{SessionOutcome, StreamSession, STREAM_ENDED_EARLY};
pub use snapshot::{DataSourceSignal, SessionPhase, SessionSnapshot};
pub use store::{ConversationStore, InMemoryConversationStore};
pub use transport::{ChatTransport, ChunkStream, HttpTransport};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        ChatClient, ChatRequest, ChatTransport, ClientConfig, CompletedMessage,
        ConversationStore, InMemoryConversationStore, SessionConfig, SessionError,
        SessionHandle, SessionOutcome, SessionPhase, SessionResult, SessionSnapshot,
        StreamSession,
    };
}
