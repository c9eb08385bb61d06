//! Domain event system — decoupled observation of the orchestration core.
//!
//! Events are published when a tool is dispatched, a turn completes or a
//! chain finishes. Subscribers (activity tracking, diagnostics) react without
//! coupling to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A model session was (re)created
    SessionRefreshed {
        model: String,
        history_len: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was answered
    ToolDispatched {
        tool_name: String,
        fingerprint: String,
        deduplicated: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// One model turn finished streaming
    TurnCompleted {
        turn: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A turn-chain reached a terminal state
    ChainFinished {
        outcome: String, // "completed", "turn_limit", "aborted", "failed"
        turns: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
