//! Chat client that runs sessions in the background.
//!
//! At most one session is in flight per conversation. Submitting into a
//! conversation that already has one cancels it, waits for it to reach a
//! terminal phase, and only then starts the new session.

use crate::config::{ClientConfig, SessionConfig};
use crate::error::{SessionError, SessionResult};
use crate::request::ChatRequest;
use crate::session::{SessionOutcome, StreamSession};
use crate::snapshot::SessionSnapshot;
use crate::store::ConversationStore;
use crate::transport::{ChatTransport, HttpTransport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Registry entry for an in-flight session.
#[derive(Debug)]
struct ActiveSession {
    session_id: String,
    cancel: CancellationToken,
    snapshots: watch::Receiver<SessionSnapshot>,
}

type Registry = Arc<Mutex<HashMap<String, ActiveSession>>>;

/// Handle to a session running in the background.
#[derive(Debug)]
pub struct SessionHandle {
    session_id: String,
    conversation_id: String,
    cancel: CancellationToken,
    snapshots: watch::Receiver<SessionSnapshot>,
    join: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    /// Session id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Conversation the session belongs to.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// New receiver for snapshots.
    pub fn snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait for the session to end.
    pub async fn outcome(self) -> SessionOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => SessionOutcome::Failed(SessionError::Internal(e.to_string())),
        }
    }
}

/// Submits chat messages and tracks in-flight sessions per conversation.
#[derive(Clone)]
pub struct ChatClient {
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn ConversationStore>,
    config: SessionConfig,
    active: Registry,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("config", &self.config)
            .field("active", &self.active.lock().len())
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Create a client over a transport and a store.
    pub fn new(transport: Arc<dyn ChatTransport>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            transport,
            store,
            config: SessionConfig::default(),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a client that talks HTTP to the configured backend.
    pub fn from_config(
        config: &ClientConfig,
        store: Arc<dyn ConversationStore>,
    ) -> SessionResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), store).with_session_config(config.session.clone()))
    }

    /// Set the per-session settings.
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Submit a message and start streaming the answer.
    ///
    /// Creates the conversation first when the request names none. Any
    /// session already in flight for the conversation is cancelled and
    /// awaited before the new one starts.
    pub async fn submit(&self, mut request: ChatRequest) -> SessionResult<SessionHandle> {
        let conversation_id = match &request.conversation_id {
            Some(id) => id.clone(),
            None => {
                let id = self.store.create_conversation().await?;
                request.conversation_id = Some(id.clone());
                id
            }
        };

        loop {
            let (previous_id, mut previous) = {
                let mut active = self.active.lock();
                match active.get(&conversation_id) {
                    Some(entry) => {
                        entry.cancel.cancel();
                        (entry.session_id.clone(), entry.snapshots.clone())
                    }
                    None => return Ok(self.start(&mut active, conversation_id, request)),
                }
            };

            tracing::info!(
                conversation_id = %conversation_id,
                previous = %previous_id,
                "cancelling in-flight session"
            );
            // Err means the sender is gone, which only happens once the session ended.
            let _ = previous.wait_for(|s| s.phase.is_terminal()).await;
            release(&self.active, &conversation_id, &previous_id);
        }
    }

    /// Cancel the in-flight session of a conversation.
    ///
    /// Returns `false` when none is running.
    pub fn cancel(&self, conversation_id: &str) -> bool {
        match self.active.lock().get(conversation_id) {
            Some(entry) => {
                tracing::debug!(conversation_id, session_id = %entry.session_id, "cancel requested");
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Check if a conversation has a session in flight.
    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.active.lock().contains_key(conversation_id)
    }

    /// Number of sessions in flight.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    fn start(
        &self,
        active: &mut HashMap<String, ActiveSession>,
        conversation_id: String,
        request: ChatRequest,
    ) -> SessionHandle {
        let session = StreamSession::new(request, self.config.clone());
        let session_id = session.id().to_string();
        let cancel = session.cancellation_token();
        let snapshots = session.subscribe();

        active.insert(
            conversation_id.clone(),
            ActiveSession {
                session_id: session_id.clone(),
                cancel: cancel.clone(),
                snapshots: snapshots.clone(),
            },
        );
        tracing::info!(conversation_id = %conversation_id, session_id = %session_id, "session started");

        let transport = Arc::clone(&self.transport);
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.active);
        let (task_conversation, task_session) = (conversation_id.clone(), session_id.clone());
        let join = tokio::spawn(async move {
            let outcome = session.run(transport.as_ref(), store.as_ref()).await;
            release(&registry, &task_conversation, &task_session);
            outcome
        });

        SessionHandle {
            session_id,
            conversation_id,
            cancel,
            snapshots,
            join,
        }
    }
}

/// Drop the registry entry if it still belongs to `session_id`.
fn release(registry: &Mutex<HashMap<String, ActiveSession>>, conversation_id: &str, session_id: &str) {
    let mut active = registry.lock();
    if active
        .get(conversation_id)
        .is_some_and(|entry| entry.session_id == session_id)
    {
        active.remove(conversation_id);
    }
}
