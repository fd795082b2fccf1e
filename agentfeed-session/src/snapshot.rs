//! Read-only session state published to the view layer.

use agentfeed_stream::{AgentTimeline, DecodeStats};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Lifecycle phase of a [`StreamSession`](crate::session::StreamSession).
///
/// ```text
/// Idle → Requesting → Streaming → Finalized
///             │           ├─────→ Failed
///             ├───────────┴─────→ Cancelled
///             └─────────────────→ Failed
/// ```
///
/// Terminal phases are absorbing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Created, not yet submitted.
    #[default]
    Idle,
    /// Waiting for response headers.
    Requesting,
    /// Consuming the response body.
    Streaming,
    /// Answer committed.
    Finalized,
    /// Stopped by the user.
    Cancelled,
    /// Transport or protocol failure.
    Failed,
}

impl SessionPhase {
    /// Check if no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled | Self::Failed)
    }

    /// Check if a request is in flight.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Requesting | Self::Streaming)
    }

    /// Check if `next` is a legal successor of this phase.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Requesting)
                | (Self::Requesting, Self::Streaming | Self::Failed | Self::Cancelled)
                | (Self::Streaming, Self::Finalized | Self::Failed | Self::Cancelled)
        )
    }
}

/// Latest data-source indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceSignal {
    /// Indicator label.
    pub indicator: String,
    /// Data categories consulted.
    pub categories: Vec<String>,
    /// Restriction applied, if any.
    pub restriction: Option<String>,
}

/// Everything the view layer renders for one session.
///
/// Side-channel fields hold the last value received; no history is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session id.
    pub session_id: String,
    /// Conversation id, once known.
    pub conversation_id: Option<String>,
    /// Lifecycle phase.
    pub phase: SessionPhase,
    /// Per-agent progress.
    pub agent_timeline: AgentTimeline,
    /// Answer text received so far.
    pub accumulated_text: String,
    /// Whether the thinking panel is shown.
    pub thinking: bool,
    /// Latest thinking message.
    pub thinking_message: Option<String>,
    /// Execution mode chosen by the router.
    pub mode: Option<String>,
    /// Why the router chose that mode.
    pub routing_reason: Option<String>,
    /// Latest data-source indicator.
    pub data_source: Option<DataSourceSignal>,
    /// Whether a report can be generated.
    pub report_ready: bool,
    /// Report payload, if sent.
    pub report_data: Option<JsonValue>,
    /// Whether the finished timeline should be shown collapsed.
    pub timeline_collapsed: bool,
    /// Message id committed on finalization.
    pub committed_message_id: Option<String>,
    /// User-facing error text for failed sessions.
    pub error: Option<String>,
    /// Line decoding counters.
    pub stats: DecodeStats,
}
