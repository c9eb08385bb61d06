//! # MizMaster Core
//!
//! Domain types, traits, and error definitions for the MizMaster scripting
//! assistant. This crate defines the model that every other crate implements
//! against:
//! - conversation messages and token usage
//! - the two-tool contract the model is offered
//! - the streaming transport and session storage seams
//! - domain events

pub mod error;
pub mod event;
pub mod message;
pub mod store;
pub mod tool;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, StoreError, ToolError, TransportError};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationMessage, Role, Source, TokenUsage};
pub use store::{InMemorySessionStore, SessionStore};
pub use tool::{
    FrameworkDocsArgs, Framework, SseDocsArgs, ToolCall, ToolDefinition, ToolDispatcher,
    ToolRequest, ToolResponse,
};
pub use transport::{ChunkStream, ModelSession, ModelTransport, ResponseChunk, SessionConfig, TurnInput};
