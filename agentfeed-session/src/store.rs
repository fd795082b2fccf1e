//! Conversation store abstraction.
//!
//! The store creates conversations and persists finalized assistant turns.
//! Real deployments back it with the REST API; the in-memory implementation
//! serves tests and demos.

use crate::error::StoreError;
use crate::request::CompletedMessage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Collaborator that owns conversation history.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a conversation and return its id.
    async fn create_conversation(&self) -> Result<String, StoreError>;

    /// Persist a finalized assistant turn.
    async fn commit_message(&self, message: &CompletedMessage) -> Result<(), StoreError>;
}

/// In-memory conversation store.
///
/// Suitable for development and testing. Data is lost when the process
/// terminates.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationStore {
    conversations: Arc<RwLock<HashMap<String, Vec<CompletedMessage>>>>,
}

impl InMemoryConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed messages of a conversation, oldest first.
    pub async fn messages(&self, conversation_id: &str) -> Vec<CompletedMessage> {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of committed messages.
    pub async fn commit_count(&self) -> usize {
        self.conversations.read().await.values().map(Vec::len).sum()
    }

    /// Number of known conversations.
    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    /// Check if the store holds no conversation.
    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create_conversation(&self) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conversations
            .write()
            .await
            .insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn commit_message(&self, message: &CompletedMessage) -> Result<(), StoreError> {
        self.conversations
            .write()
            .await
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(conversation_id: &str, message_id: &str) -> CompletedMessage {
        CompletedMessage {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            text: "answer".to_string(),
            report: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_conversation() {
        let store = InMemoryConversationStore::new();
        let a = store.create_conversation().await.unwrap();
        let b = store.create_conversation().await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len().await, 2);
        assert!(store.messages(&a).await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_appends_in_order() {
        let store = InMemoryConversationStore::new();
        let id = store.create_conversation().await.unwrap();
        store.commit_message(&message(&id, "m1")).await.unwrap();
        store.commit_message(&message(&id, "m2")).await.unwrap();

        let ids: Vec<String> = store
            .messages(&id)
            .await
            .into_iter()
            .map(|m| m.message_id)
            .collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(store.commit_count().await, 2);
    }

    #[tokio::test]
    async fn test_commit_to_server_created_conversation() {
        let store = InMemoryConversationStore::new();
        store.commit_message(&message("srv-7", "m1")).await.unwrap();
        assert_eq!(store.messages("srv-7").await.len(), 1);
    }
}
