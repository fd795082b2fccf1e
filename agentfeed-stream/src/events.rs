//! Streaming event types.
//!
//! This module defines the closed set of events a multi-agent response
//! stream can carry once each line has been classified by the
//! [`decode`](crate::decode) module.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Pseudo-agent id used for decomposition phases.
pub const DECOMPOSITION_AGENT: &str = "decomposition";

/// Pseudo-agent id used for synthesis phases.
pub const SYNTHESIS_AGENT: &str = "synthesis";

/// Agent id used when a timeline event names no agent.
pub const UNKNOWN_AGENT: &str = "unknown";

/// Phase carried by a timeline event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelinePhase {
    /// An agent was scheduled or started.
    AgentStart,
    /// An agent reported progress.
    AgentProgress,
    /// An agent finished.
    AgentComplete,
    /// Query decomposition started.
    DecompositionStart,
    /// Query decomposition finished.
    DecompositionComplete,
    /// Answer synthesis started.
    SynthesisStart,
    /// Answer synthesis finished.
    SynthesisComplete,
    /// A phase this client does not know about.
    #[serde(untagged)]
    Other(String),
}

impl TimelinePhase {
    /// Parse a wire phase name. Unknown names are preserved as `Other`.
    pub fn parse(name: &str) -> Self {
        match name {
            "agent_start" => Self::AgentStart,
            "agent_progress" => Self::AgentProgress,
            "agent_complete" => Self::AgentComplete,
            "decomposition_start" => Self::DecompositionStart,
            "decomposition_complete" => Self::DecompositionComplete,
            "synthesis_start" => Self::SynthesisStart,
            "synthesis_complete" => Self::SynthesisComplete,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire name of this phase.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AgentStart => "agent_start",
            Self::AgentProgress => "agent_progress",
            Self::AgentComplete => "agent_complete",
            Self::DecompositionStart => "decomposition_start",
            Self::DecompositionComplete => "decomposition_complete",
            Self::SynthesisStart => "synthesis_start",
            Self::SynthesisComplete => "synthesis_complete",
            Self::Other(name) => name,
        }
    }

    /// Pseudo-agent this phase belongs to, if any.
    pub fn pseudo_agent(&self) -> Option<&'static str> {
        match self {
            Self::DecompositionStart | Self::DecompositionComplete => Some(DECOMPOSITION_AGENT),
            Self::SynthesisStart | Self::SynthesisComplete => Some(SYNTHESIS_AGENT),
            _ => None,
        }
    }
}

impl fmt::Display for TimelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events decoded from a multi-agent response stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The pipeline is thinking; precedes any token.
    Thinking {
        /// Status text for the thinking panel.
        message: String,
    },

    /// The router picked an execution mode.
    Routing {
        /// Selected mode label.
        mode: String,
        /// Why the router chose it.
        reason: Option<String>,
    },

    /// Progress of one agent (or pseudo-agent) in the pipeline.
    Timeline {
        /// Agent the event refers to.
        agent_id: String,
        /// Lifecycle phase.
        phase: TimelinePhase,
        /// Display text.
        message: Option<String>,
    },

    /// The answer drew on an external data source.
    DataSourceUsed {
        /// Indicator label shown to the user.
        indicator: String,
        /// Data categories consulted.
        categories: Vec<String>,
        /// Restriction applied to the source, if any.
        restriction: Option<String>,
    },

    /// Incremental fragment of the answer text.
    Token {
        /// Text to append.
        delta: String,
    },

    /// A report can be generated from this answer.
    ReportReady {
        /// Report payload, if the server sent one.
        data: Option<JsonValue>,
    },

    /// Terminal success.
    Final {
        /// Server id of the persisted assistant message.
        message_id: String,
    },

    /// Terminal failure.
    Error {
        /// Error message.
        message: String,
    },
}

impl StreamEvent {
    /// Create a thinking event.
    pub fn thinking(message: impl Into<String>) -> Self {
        Self::Thinking {
            message: message.into(),
        }
    }

    /// Create a token event.
    pub fn token(delta: impl Into<String>) -> Self {
        Self::Token {
            delta: delta.into(),
        }
    }

    /// Create a timeline event.
    pub fn timeline(agent_id: impl Into<String>, phase: TimelinePhase) -> Self {
        Self::Timeline {
            agent_id: agent_id.into(),
            phase,
            message: None,
        }
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Short kind name, as used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Routing { .. } => "routing",
            Self::Timeline { .. } => "timeline",
            Self::DataSourceUsed { .. } => "data_source_used",
            Self::Token { .. } => "token",
            Self::ReportReady { .. } => "report_ready",
            Self::Final { .. } => "final",
            Self::Error { .. } => "error",
        }
    }

    /// Check if this event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final { .. } | Self::Error { .. })
    }

    /// Get the delta if this is a token.
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Token { delta } => Some(delta),
            _ => None,
        }
    }
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thinking { message } => write!(f, "[thinking] {}", message),
            Self::Routing { mode, .. } => write!(f, "[routing] {}", mode),
            Self::Timeline {
                agent_id, phase, ..
            } => write!(f, "[{}] {}", phase, agent_id),
            Self::DataSourceUsed { indicator, .. } => write!(f, "[data_source] {}", indicator),
            Self::Token { delta } => write!(f, "{}", delta),
            Self::ReportReady { .. } => write!(f, "[report_ready]"),
            Self::Final { message_id } => write!(f, "[final] {}", message_id),
            Self::Error { message } => write!(f, "[error] {}", message),
        }
    }
}
