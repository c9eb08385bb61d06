//! History pruning under a token and message budget.
//!
//! The output is the protected first message (when enabled) followed by the
//! longest suffix of the remaining stable messages that fits the budget.
//! Everything between the two is dropped wholesale.

use mizmaster_config::ContextConfig;
use mizmaster_core::ConversationMessage;
use tracing::debug;

use super::token::{estimate_history_tokens, estimate_message_tokens};

/// Limits applied by [`ContextPruner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneBudget {
    pub max_tokens: usize,
    pub max_messages: usize,
    pub protect_first: bool,
    pub message_overhead: usize,
}

impl Default for PruneBudget {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

impl From<&ContextConfig> for PruneBudget {
    fn from(config: &ContextConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            max_messages: config.max_messages,
            protect_first: config.protect_first,
            message_overhead: config.message_overhead,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextPruner {
    budget: PruneBudget,
}

impl ContextPruner {
    pub fn new(budget: PruneBudget) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> PruneBudget {
        self.budget
    }

    /// Select the history to send. Streaming messages are never included.
    pub fn prune(&self, history: &[ConversationMessage]) -> Vec<ConversationMessage> {
        let stable: Vec<&ConversationMessage> = history.iter().filter(|m| !m.is_streaming).collect();
        let Some((first, rest)) = stable.split_first() else {
            return Vec::new();
        };

        let cost = |m: &ConversationMessage| estimate_message_tokens(m, self.budget.message_overhead);

        let (protected, candidates) = if self.budget.protect_first {
            (Some(*first), rest)
        } else {
            (None, stable.as_slice())
        };

        let mut used = protected.map_or(0, |m| cost(m));
        let slots = self
            .budget
            .max_messages
            .saturating_sub(usize::from(protected.is_some()));

        let mut kept: Vec<&ConversationMessage> = Vec::new();
        for msg in candidates.iter().rev() {
            if kept.len() >= slots {
                debug!(message_id = %msg.id, "Message count limit reached");
                break;
            }
            let tokens = cost(*msg);
            if used + tokens > self.budget.max_tokens {
                debug!(message_id = %msg.id, tokens, "Token budget exceeded");
                break;
            }
            used += tokens;
            kept.push(*msg);
        }

        let pruned: Vec<ConversationMessage> = protected
            .into_iter()
            .chain(kept.into_iter().rev())
            .cloned()
            .collect();

        debug!(
            input = history.len(),
            input_tokens = estimate_history_tokens(history, self.budget.message_overhead),
            kept = pruned.len(),
            tokens = estimate_history_tokens(&pruned, self.budget.message_overhead),
            "History pruned"
        );

        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> Vec<ConversationMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ConversationMessage::user(format!("question {i}"))
                } else {
                    ConversationMessage::model(format!("answer {i}"))
                }
            })
            .collect()
    }

    fn budget(max_tokens: usize, max_messages: usize) -> PruneBudget {
        PruneBudget {
            max_tokens,
            max_messages,
            ..PruneBudget::default()
        }
    }

    #[test]
    fn empty_history_is_empty() {
        assert!(ContextPruner::default().prune(&[]).is_empty());
    }

    #[test]
    fn tiny_budget_keeps_protected_first() {
        let input = history(100);
        let out = ContextPruner::new(budget(1, 20)).prune(&input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], input[0]);
    }

    #[test]
    fn budget_exactly_for_first_keeps_only_first() {
        let input = history(10);
        let first_cost = estimate_message_tokens(&input[0], 5);
        let out = ContextPruner::new(budget(first_cost, 20)).prune(&input);
        assert_eq!(out, vec![input[0].clone()]);
    }

    #[test]
    fn large_budget_keeps_all_stable_messages() {
        let mut input = history(10);
        input.push(ConversationMessage::streaming_placeholder("gemini-3-pro-preview"));
        let out = ContextPruner::new(budget(1_000_000, 100)).prune(&input);
        assert_eq!(out, input[..10].to_vec());
    }

    #[test]
    fn message_limit_counts_protected_slot() {
        let input = history(30);
        let out = ContextPruner::new(budget(1_000_000, 20)).prune(&input);
        assert_eq!(out.len(), 20);
        assert_eq!(out[0], input[0]);
        assert_eq!(out[1], input[11]);
        assert_eq!(out[19], input[29]);
    }

    #[test]
    fn without_protection_keeps_recent_suffix() {
        let input = history(30);
        let pruner = ContextPruner::new(PruneBudget {
            protect_first: false,
            ..budget(1_000_000, 5)
        });
        let out = pruner.prune(&input);
        assert_eq!(out, input[25..].to_vec());
    }

    #[test]
    fn pruned_history_fits_token_budget() {
        let input = history(200);
        let budget = budget(120, 100);
        let out = ContextPruner::new(budget).prune(&input);
        let tokens = estimate_history_tokens(&out, budget.message_overhead);
        assert!(tokens <= budget.max_tokens, "{tokens} tokens kept");
        assert!(estimate_history_tokens(&input, budget.message_overhead) > budget.max_tokens);
        assert_eq!(out.last(), input.last());
    }

    #[test]
    fn dropped_message_stops_the_walk() {
        let mut input = history(5);
        input[2].text = "x".repeat(4_000); // ~1000 tokens
        let pruner = ContextPruner::new(budget(200, 20));
        let out = pruner.prune(&input);
        // first + messages 3 and 4; message 1 fits but lies behind the dropped one
        assert_eq!(out, vec![input[0].clone(), input[3].clone(), input[4].clone()]);
    }
}
