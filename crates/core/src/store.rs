//! Session storage interface.
//!
//! Persistence belongs to the surrounding application. The engine only loads
//! history through this trait; saving is the caller's job once a send
//! completes.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::message::ConversationMessage;

/// Durable, idempotent storage of per-session message lists.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the message list of a session. Unknown sessions yield an empty list.
    async fn load_history(&self, session_id: &str) -> Result<Vec<ConversationMessage>, StoreError>;

    /// Replace the message list of a session.
    async fn save_history(
        &self,
        session_id: &str,
        messages: &[ConversationMessage],
    ) -> Result<(), StoreError>;
}

/// In-process store for tests and ephemeral sessions.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<ConversationMessage>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_history(&self, session_id: &str) -> Result<Vec<ConversationMessage>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_history(
        &self,
        session_id: &str,
        messages: &[ConversationMessage],
    ) -> Result<(), StoreError> {
        debug!(session_id, messages = messages.len(), "Saving session history");
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), messages.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load() {
        let store = InMemorySessionStore::new();
        let msgs = vec![ConversationMessage::user("hi"), ConversationMessage::model("hello")];
        store.save_history("s1", &msgs).await.unwrap();
        let loaded = store.load_history("s1").await.unwrap();
        assert_eq!(loaded, msgs);
    }

    #[tokio::test]
    async fn unknown_session_is_empty() {
        let store = InMemorySessionStore::new();
        assert!(store.load_history("missing").await.unwrap().is_empty());
    }
}
