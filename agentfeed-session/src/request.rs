//! Request and message types exchanged with collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Body of a streaming chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation to append to. Created on demand when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// User message text.
    pub message: String,
    /// Previously uploaded files referenced by this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ChatRequest {
    /// Create a request for a new conversation.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            conversation_id: None,
            message: message.into(),
            attachments: Vec::new(),
        }
    }

    /// Target an existing conversation.
    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Attach an uploaded file.
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Reference to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Upload id assigned by the backend.
    pub id: String,
    /// Original file name.
    pub name: String,
    /// MIME type, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Download URL, if the backend exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Attachment {
    /// Create an attachment reference.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content_type: None,
            url: None,
        }
    }

    /// Set the MIME type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// An assistant turn committed after a successful stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedMessage {
    /// Conversation the message belongs to.
    pub conversation_id: String,
    /// Server id from the final event.
    pub message_id: String,
    /// Full answer text.
    pub text: String,
    /// Report payload, if one was announced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<JsonValue>,
    /// When the message was committed.
    pub created_at: DateTime<Utc>,
}
