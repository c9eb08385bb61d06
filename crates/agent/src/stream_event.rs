//! Events emitted while a turn-chain runs.
//!
//! `ChainEvent` is the discrete event stream (text, tool activity, terminal
//! state). `ChainProgress` is the accumulated snapshot published after every
//! chunk, which a UI renders directly.

use mizmaster_core::{Source, TokenUsage};
use serde::{Deserialize, Serialize};

/// Loop states of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    Idle,
    /// Waiting for the first chunk of the chain
    Connecting,
    Streaming,
    /// Resolving the tool calls of the finished turn
    ToolDispatch,
    Done,
    Error,
    Aborted,
}

/// Discrete events of one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainEvent {
    /// Partial text from the model.
    Chunk { content: String },

    /// The model requested a tool.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// A tool call was answered.
    ToolResult {
        id: String,
        name: String,
        output: String,
        deduplicated: bool,
    },

    /// The chain ended without error.
    Done {
        turns: u32,
        tool_calls_made: usize,
        turn_limit_reached: bool,
    },

    /// The chain ended on a transport failure.
    Error { message: String },

    /// The user stopped the chain.
    Aborted,
}

impl ChainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::Aborted => "aborted",
        }
    }
}

/// Accumulated state of the in-progress model message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainProgress {
    pub state: ChainState,
    pub turn: u32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_status_label: Option<String>,
    pub elapsed_ms: u64,
}

/// Receives chain events. Called inline by the orchestrator, so
/// implementations must not block.
pub trait ChainObserver: Send + Sync {
    fn on_event(&self, _event: &ChainEvent) {}

    fn on_progress(&self, _progress: &ChainProgress) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl ChainObserver for NoopObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_serializes_with_type_tag() {
        let event = ChainEvent::Chunk {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn aborted_serializes_as_bare_tag() {
        let json = serde_json::to_string(&ChainEvent::Aborted).unwrap();
        assert_eq!(json, r#"{"type":"aborted"}"#);
    }

    #[test]
    fn event_types() {
        assert_eq!(
            ChainEvent::ToolResult {
                id: "1".into(),
                name: "get_sse_docs".into(),
                output: String::new(),
                deduplicated: true,
            }
            .event_type(),
            "tool_result"
        );
        assert_eq!(
            ChainEvent::Error {
                message: "x".into()
            }
            .event_type(),
            "error"
        );
    }
}
