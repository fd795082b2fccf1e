//! Streaming chat session.
//!
//! A [`StreamSession`] owns one request/response exchange from submission to
//! a terminal phase. It drives `chunks → lines → events`, folds events into
//! the agent timeline and answer buffer, publishes a [`SessionSnapshot`]
//! after every change, and commits the answer exactly once on `Final`.
//!
//! The only suspension points are waiting for response headers and waiting
//! for the next chunk. Both race against the session's cancellation token,
//! and an event that becomes available after cancellation is never
//! dispatched.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::request::{ChatRequest, CompletedMessage};
use crate::snapshot::{DataSourceSignal, SessionPhase, SessionSnapshot};
use crate::store::ConversationStore;
use crate::transport::ChatTransport;
use agentfeed_stream::{AgentTimeline, AnswerBuffer, EventStream, LineFramer, LineStream, StreamEvent};
use chrono::Utc;
use futures::StreamExt;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Protocol error when the body closes without `Final` or `Error`.
pub const STREAM_ENDED_EARLY: &str = "stream ended before final event";

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The answer was committed.
    Finalized(CompletedMessage),
    /// The user cancelled. Not an error.
    Cancelled,
    /// Transport, protocol or store failure. Nothing was committed.
    Failed(SessionError),
}

impl SessionOutcome {
    /// Terminal phase corresponding to this outcome.
    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Finalized(_) => SessionPhase::Finalized,
            Self::Cancelled => SessionPhase::Cancelled,
            Self::Failed(_) => SessionPhase::Failed,
        }
    }

    /// The committed message, if finalized.
    pub fn message(&self) -> Option<&CompletedMessage> {
        match self {
            Self::Finalized(message) => Some(message),
            _ => None,
        }
    }

    /// The failure, if failed.
    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Text to surface to the user. Cancellation is not surfaced.
    pub fn user_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }
}

/// One in-flight chat exchange.
///
/// Consumed by [`run`](Self::run); a session is never reused.
#[derive(Debug)]
pub struct StreamSession {
    id: String,
    request: ChatRequest,
    config: SessionConfig,
    cancel: CancellationToken,
    phase: SessionPhase,
    timeline: AgentTimeline,
    answer: AnswerBuffer,
    report: Option<JsonValue>,
    report_seen: bool,
    snapshot: Arc<watch::Sender<SessionSnapshot>>,
}

impl StreamSession {
    /// Create an idle session for a request.
    pub fn new(request: ChatRequest, config: SessionConfig) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let (snapshot, _) = watch::channel(SessionSnapshot {
            session_id: id.clone(),
            conversation_id: request.conversation_id.clone(),
            ..SessionSnapshot::default()
        });

        Self {
            id,
            request,
            config,
            cancel: CancellationToken::new(),
            phase: SessionPhase::Idle,
            timeline: AgentTimeline::new(),
            answer: AnswerBuffer::new(),
            report: None,
            report_seen: false,
            snapshot: Arc::new(snapshot),
        }
    }

    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Conversation id, once known.
    pub fn conversation_id(&self) -> Option<&str> {
        self.request.conversation_id.as_deref()
    }

    /// Token that cancels this session.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Subscribe to snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Run the session to a terminal phase.
    pub async fn run(
        mut self,
        transport: &dyn ChatTransport,
        store: &dyn ConversationStore,
    ) -> SessionOutcome {
        let outcome = self.drive(transport, store).await;

        let stats = self.snapshot.borrow().stats;
        tracing::info!(
            session_id = %self.id,
            conversation_id = ?self.request.conversation_id,
            phase = ?self.phase,
            events = stats.events,
            dropped = stats.dropped(),
            "session ended"
        );
        outcome
    }

    async fn drive(
        &mut self,
        transport: &dyn ChatTransport,
        store: &dyn ConversationStore,
    ) -> SessionOutcome {
        self.transition(SessionPhase::Requesting, |_| {});

        let cancel = self.cancel.clone();
        if cancel.is_cancelled() {
            return self.cancelled();
        }

        let conversation_id = match self.ensure_conversation(store).await {
            Ok(id) => id,
            Err(e) => return self.fail(e),
        };
        tracing::info!(session_id = %self.id, conversation_id = %conversation_id, "submitting chat request");

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = transport.open_stream(&self.request, cancel.clone()) => Some(opened),
        };
        let chunks = match opened {
            None => return self.cancelled(),
            Some(Err(e)) => return self.fail(e.into()),
            Some(Ok(chunks)) => chunks,
        };
        self.transition(SessionPhase::Streaming, |_| {});

        let framer = LineFramer::with_max_line_bytes(self.config.max_line_bytes);
        let mut events = EventStream::new(LineStream::with_framer(chunks, framer));

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = events.next() => Some(next),
            };
            let Some(next) = next else {
                return self.cancelled();
            };
            if cancel.is_cancelled() {
                return self.cancelled();
            }

            let stats = events.stats();
            self.publish(|s| s.stats = stats);

            match next {
                Some(Ok(event)) => {
                    if let Some(outcome) = self.dispatch(event, &conversation_id, store).await {
                        return outcome;
                    }
                }
                Some(Err(e)) => return self.fail(e.into()),
                None => return self.fail(SessionError::protocol(STREAM_ENDED_EARLY)),
            }
        }
    }

    async fn ensure_conversation(
        &mut self,
        store: &dyn ConversationStore,
    ) -> Result<String, SessionError> {
        if let Some(id) = &self.request.conversation_id {
            return Ok(id.clone());
        }

        let id = store.create_conversation().await?;
        tracing::debug!(session_id = %self.id, conversation_id = %id, "created conversation");
        self.request.conversation_id = Some(id.clone());
        let published = id.clone();
        self.publish(|s| s.conversation_id = Some(published));
        Ok(id)
    }

    /// Apply one event. Returns the outcome when the event is terminal.
    async fn dispatch(
        &mut self,
        event: StreamEvent,
        conversation_id: &str,
        store: &dyn ConversationStore,
    ) -> Option<SessionOutcome> {
        tracing::debug!(session_id = %self.id, kind = event.kind(), "dispatching event");

        match event {
            StreamEvent::Thinking { message } => {
                let before_first_token = self.answer.is_empty();
                self.publish(|s| {
                    s.thinking_message = Some(message);
                    if before_first_token {
                        s.thinking = true;
                    }
                });
            }
            StreamEvent::Routing { mode, reason } => {
                self.publish(|s| {
                    s.mode = Some(mode);
                    s.routing_reason = reason;
                });
            }
            event @ StreamEvent::Timeline { .. } => {
                if self.timeline.apply(&event) {
                    let timeline = self.timeline.clone();
                    self.publish(|s| s.agent_timeline = timeline);
                }
            }
            StreamEvent::DataSourceUsed {
                indicator,
                categories,
                restriction,
            } => {
                self.publish(|s| {
                    s.data_source = Some(DataSourceSignal {
                        indicator,
                        categories,
                        restriction,
                    });
                });
            }
            StreamEvent::Token { delta } => {
                let first = self.answer.push(&delta);
                self.publish(|s| {
                    s.accumulated_text.push_str(&delta);
                    if first {
                        s.thinking = false;
                    }
                });
            }
            StreamEvent::ReportReady { data } => {
                if self.report_seen {
                    tracing::warn!(session_id = %self.id, "ignoring repeated report_ready");
                } else {
                    self.report_seen = true;
                    self.report = data.clone();
                    self.publish(|s| {
                        s.report_ready = true;
                        s.report_data = data;
                    });
                }
            }
            StreamEvent::Final { message_id } => {
                return Some(self.finalize(message_id, conversation_id, store).await);
            }
            StreamEvent::Error { message } => {
                return Some(self.fail(SessionError::Protocol(message)));
            }
        }

        None
    }

    async fn finalize(
        &mut self,
        message_id: String,
        conversation_id: &str,
        store: &dyn ConversationStore,
    ) -> SessionOutcome {
        let message = CompletedMessage {
            conversation_id: conversation_id.to_string(),
            message_id,
            text: self.answer.text().to_string(),
            report: self.report.clone(),
            created_at: Utc::now(),
        };

        if let Err(e) = store.commit_message(&message).await {
            return self.fail(e.into());
        }

        self.answer.clear();
        self.timeline.complete_all();
        let timeline = self.timeline.clone();
        let committed_id = message.message_id.clone();
        self.transition(SessionPhase::Finalized, |s| {
            s.agent_timeline = timeline;
            s.accumulated_text.clear();
            s.thinking = false;
            s.committed_message_id = Some(committed_id);
        });
        self.schedule_collapse();

        tracing::info!(
            session_id = %self.id,
            message_id = %message.message_id,
            chars = message.text.len(),
            "answer committed"
        );
        SessionOutcome::Finalized(message)
    }

    fn fail(&mut self, error: SessionError) -> SessionOutcome {
        tracing::warn!(session_id = %self.id, error = %error, "session failed");
        self.answer.clear();
        let text = error.to_string();
        // The partial answer stays visible but is never committed.
        self.transition(SessionPhase::Failed, |s| {
            s.thinking = false;
            s.error = Some(text);
        });
        SessionOutcome::Failed(error)
    }

    fn cancelled(&mut self) -> SessionOutcome {
        tracing::info!(session_id = %self.id, phase = ?self.phase, "session cancelled");
        self.answer.clear();
        self.transition(SessionPhase::Cancelled, |s| {
            s.accumulated_text.clear();
            s.thinking = false;
        });
        SessionOutcome::Cancelled
    }

    fn transition(&mut self, next: SessionPhase, update: impl FnOnce(&mut SessionSnapshot)) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal session transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::debug!(session_id = %self.id, from = ?self.phase, to = ?next, "session transition");

        self.phase = next;
        self.snapshot.send_modify(|s| {
            s.phase = next;
            update(s);
        });
    }

    fn publish(&self, update: impl FnOnce(&mut SessionSnapshot)) {
        self.snapshot.send_modify(update);
    }

    fn schedule_collapse(&self) {
        let snapshot = Arc::clone(&self.snapshot);
        let delay = self.config.collapse_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            snapshot.send_modify(|s| s.timeline_collapsed = true);
        });
    }
}
