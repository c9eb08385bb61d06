//! Model transport traits — the abstraction over the streaming LLM channel.
//!
//! The network protocol itself lives outside this workspace. The engine only
//! needs to open a session and pull response chunks from it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::message::{ConversationMessage, Source, TokenUsage};
use crate::tool::{ToolCall, ToolDefinition, ToolResponse};

/// Everything needed to open a chat session with the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// The model to use (e.g., "gemini-3-pro-preview")
    pub model: String,

    /// Effective system instruction
    pub system_instruction: String,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Prior conversation, already pruned
    #[serde(default)]
    pub history: Vec<ConversationMessage>,

    /// Tools the model may call
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

/// What is sent to the model on one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnInput {
    /// A user message (first turn of a chain)
    Text { text: String },

    /// Answers to the tool calls of the previous turn
    ToolResponses { responses: Vec<ToolResponse> },
}

/// One partial response pulled from the stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseChunk {
    /// Text fragments, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<String>,

    /// Tool invocations requested in this chunk
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Usage metadata (cumulative for the turn)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    /// Grounding citations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,

    /// Model version reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl ResponseChunk {
    /// A chunk with a single text fragment.
    pub fn text(fragment: impl Into<String>) -> Self {
        Self {
            text: vec![fragment.into()],
            ..Self::default()
        }
    }

    /// A chunk carrying a single tool call.
    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            tool_calls: vec![call],
            ..Self::default()
        }
    }

    /// All text fragments joined.
    pub fn joined_text(&self) -> String {
        self.text.concat()
    }
}

/// Receiving end of one streamed turn.
pub type ChunkStream = mpsc::Receiver<Result<ResponseChunk, TransportError>>;

/// An open chat session. History accumulates on the transport side.
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Send one turn and get a stream of response chunks.
    async fn send_stream(&self, input: TurnInput) -> Result<ChunkStream, TransportError>;
}

/// Factory for chat sessions.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// A human-readable name for this transport (e.g., "gemini").
    fn name(&self) -> &str;

    /// Open a new session seeded with history and tool declarations.
    async fn create_session(
        &self,
        config: SessionConfig,
    ) -> Result<Arc<dyn ModelSession>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_input_serialization() {
        let input = TurnInput::ToolResponses {
            responses: vec![ToolResponse {
                call_id: "c1".into(),
                name: "get_sse_docs".into(),
                output: "[]".into(),
            }],
        };
        let json = serde_json::to_string(&input).unwrap();
        assert!(json.contains(r#""type":"tool_responses""#));
        assert!(json.contains("get_sse_docs"));
    }

    #[test]
    fn chunk_joins_fragments() {
        let chunk = ResponseChunk {
            text: vec!["Hello, ".into(), "pilot".into()],
            ..ResponseChunk::default()
        };
        assert_eq!(chunk.joined_text(), "Hello, pilot");
        assert!(ResponseChunk::text("x").tool_calls.is_empty());
    }
}
