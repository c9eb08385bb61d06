//! Conversation message domain types.
//!
//! These are the value objects that flow between the UI, the engine and the
//! storage layer. The engine produces and updates them but never persists them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The language model
    Model,
}

/// Token counts reported by the model for one completed response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub response_tokens: u32,
    pub total_tokens: u32,
}

/// A grounding citation attached to a model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub text: String,

    /// Timestamp
    pub created_at: DateTime<Utc>,

    /// Transient marker for the in-progress model message of an active send
    #[serde(default)]
    pub is_streaming: bool,

    /// Grounding citations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,

    /// The model requested by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    /// The model version reported by the response stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_model_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,

    /// Generation duration so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,

    /// Live label while a tool call is being resolved (e.g. "Librarian: Fetching SPAWN...")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_status_label: Option<String>,
}

impl ConversationMessage {
    fn new(role: Role, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text,
            created_at: Utc::now(),
            is_streaming: false,
            sources: Vec::new(),
            model_id: None,
            verified_model_id: None,
            token_usage: None,
            elapsed_ms: None,
            tool_status_label: None,
        }
    }

    /// Create a new user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into())
    }

    /// Create a completed model message.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text.into())
    }

    /// Create the empty, streaming placeholder for a model response.
    pub fn streaming_placeholder(model_id: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Model, String::new());
        msg.is_streaming = true;
        msg.model_id = Some(model_id.into());
        msg
    }

    /// Whether this message carries any non-whitespace text.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = ConversationMessage::user("Hello, MizMaster!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text, "Hello, MizMaster!");
        assert!(!msg.is_streaming);
    }

    #[test]
    fn placeholder_is_streaming_and_empty() {
        let msg = ConversationMessage::streaming_placeholder("gemini-3-pro-preview");
        assert_eq!(msg.role, Role::Model);
        assert!(msg.is_streaming);
        assert!(!msg.has_text());
        assert_eq!(msg.model_id.as_deref(), Some("gemini-3-pro-preview"));
    }

    #[test]
    fn message_serialization_roundtrip() {
        let mut msg = ConversationMessage::model("Use SPAWN:New()");
        msg.token_usage = Some(TokenUsage {
            prompt_tokens: 10,
            response_tokens: 5,
            total_tokens: 15,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"model""#));
        let back: ConversationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
