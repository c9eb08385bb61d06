//! Token estimation utilities.
//!
//! Character heuristic: ~4 characters per token, rounded up, plus a fixed
//! per-message overhead for role and framing.

use mizmaster_core::ConversationMessage;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message_tokens(message: &ConversationMessage, overhead: usize) -> usize {
    estimate_tokens(&message.text) + overhead
}

/// Estimate tokens for a slice of messages.
pub fn estimate_history_tokens(messages: &[ConversationMessage], overhead: usize) -> usize {
    messages
        .iter()
        .map(|m| estimate_message_tokens(m, overhead))
        .sum()
}
