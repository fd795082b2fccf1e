//! Agent timeline reduction.
//!
//! The timeline maps each agent id (including the `decomposition` and
//! `synthesis` pseudo-agents) to its status. Status only moves forward along
//! `pending → running → completed`; the reducer enforces this, so callers
//! can feed it any event order.

use crate::events::{StreamEvent, TimelinePhase};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Substring of an `agent_start` message that marks the agent as queued.
const QUEUED_MARKER: &str = "queued";

/// Status of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Scheduled but not started.
    Pending,
    /// Working.
    Running,
    /// Done. Absorbing.
    Completed,
}

/// Display entry for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEntry {
    /// Current status.
    pub status: AgentStatus,
    /// Latest display message.
    pub message: Option<String>,
}

/// Per-agent progress, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentTimeline {
    agents: IndexMap<String, AgentEntry>,
}

impl AgentTimeline {
    /// Create an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an agent.
    pub fn get(&self, agent_id: &str) -> Option<&AgentEntry> {
        self.agents.get(agent_id)
    }

    /// Status of an agent, if it has been seen.
    pub fn status(&self, agent_id: &str) -> Option<AgentStatus> {
        self.agents.get(agent_id).map(|entry| entry.status)
    }

    /// Iterate agents in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentEntry)> {
        self.agents.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Number of agents seen.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Check if no agent has been seen.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Check if every agent seen so far has completed.
    pub fn all_completed(&self) -> bool {
        self.agents
            .values()
            .all(|entry| entry.status == AgentStatus::Completed)
    }

    /// Mark every agent completed. Returns whether anything changed.
    ///
    /// Used once the answer is final: agents the server never closed must
    /// not keep showing as pending or running.
    pub fn complete_all(&mut self) -> bool {
        let mut changed = false;
        for entry in self.agents.values_mut() {
            if entry.status != AgentStatus::Completed {
                entry.status = AgentStatus::Completed;
                changed = true;
            }
        }
        changed
    }

    /// Apply a stream event in place. Returns whether anything changed.
    ///
    /// Non-timeline events and unknown phases are no-ops.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        let StreamEvent::Timeline {
            agent_id,
            phase,
            message,
        } = event
        else {
            return false;
        };

        let status = match phase {
            TimelinePhase::AgentStart => {
                if message.as_deref().is_some_and(|m| m.contains(QUEUED_MARKER)) {
                    AgentStatus::Pending
                } else {
                    AgentStatus::Running
                }
            }
            TimelinePhase::AgentProgress
            | TimelinePhase::DecompositionStart
            | TimelinePhase::SynthesisStart => AgentStatus::Running,
            TimelinePhase::AgentComplete
            | TimelinePhase::DecompositionComplete
            | TimelinePhase::SynthesisComplete => AgentStatus::Completed,
            TimelinePhase::Other(name) => {
                tracing::debug!(phase = %name, agent = %agent_id, "ignoring unknown timeline phase");
                return false;
            }
        };

        let id = phase.pseudo_agent().unwrap_or(agent_id.as_str());
        self.advance(id, status, message.as_deref())
    }

    fn advance(&mut self, agent_id: &str, status: AgentStatus, message: Option<&str>) -> bool {
        let Some(entry) = self.agents.get_mut(agent_id) else {
            self.agents.insert(
                agent_id.to_string(),
                AgentEntry {
                    status,
                    message: message.map(str::to_string),
                },
            );
            return true;
        };

        if entry.status == AgentStatus::Completed {
            return false;
        }

        let mut changed = false;
        if status > entry.status {
            entry.status = status;
            changed = true;
        }
        if let Some(text) = message {
            if entry.message.as_deref() != Some(text) {
                entry.message = Some(text.to_string());
                changed = true;
            }
        }
        changed
    }
}

/// Pure reducer: `(timeline, event) → timeline`.
#[must_use]
pub fn reduce(mut timeline: AgentTimeline, event: &StreamEvent) -> AgentTimeline {
    timeline.apply(event);
    timeline
}
