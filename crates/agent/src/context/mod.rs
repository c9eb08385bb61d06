//! Conversation context sent to the model when a session is (re)built.

pub mod pruner;
pub mod token;

pub use pruner::{ContextPruner, PruneBudget};
pub use token::{estimate_history_tokens, estimate_message_tokens, estimate_tokens};
