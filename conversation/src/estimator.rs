//! Token estimation for conversation budgets.
//!
//! Every estimator follows the same accounting: 4 tokens of framing per
//! message, the token length of each present text field (content and name),
//! one token back when a name is present, and 3 tokens once for the reply.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use llm::ChatMessage;
use tiktoken_rs::CoreBPE;

const TOKENS_PER_MESSAGE: usize = 4;
const TOKENS_PER_NAME: isize = -1;
const REPLY_FRAMING_TOKENS: usize = 3;

/// Approximates how many tokens a message sequence costs for a model.
pub trait TokenEstimator: Send + Sync {
    /// Deterministic for a given input; never fails, whatever the model.
    fn estimate(&self, messages: &[ChatMessage], model_hint: &str) -> usize;
}

fn count_with(messages: &[ChatMessage], text_tokens: impl Fn(&str) -> usize) -> usize {
    let per_message: usize = messages
        .iter()
        .map(|msg| {
            let mut tokens = TOKENS_PER_MESSAGE;
            if let Some(content) = &msg.content {
                tokens += text_tokens(content);
            }
            if let Some(name) = &msg.name {
                tokens = (tokens + text_tokens(name)).saturating_add_signed(TOKENS_PER_NAME);
            }
            tokens
        })
        .sum();
    per_message + REPLY_FRAMING_TOKENS
}

/// `ceil(chars / 4)` per text field. Needs no vocabulary.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicEstimator;

impl HeuristicEstimator {
    pub fn text_tokens(text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, messages: &[ChatMessage], _model_hint: &str) -> usize {
        count_with(messages, Self::text_tokens)
    }
}

/// BPE token counts via `tiktoken-rs`.
///
/// Models tiktoken does not know are counted with `cl100k_base`. Encoders
/// are cached per model hint, so the fallback warning is logged once per model.
#[derive(Default)]
pub struct TiktokenEstimator {
    encoders: DashMap<String, Option<Arc<CoreBPE>>>,
    fallback: OnceLock<Option<Arc<CoreBPE>>>,
}

impl TiktokenEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    fn fallback(&self) -> Option<Arc<CoreBPE>> {
        self.fallback
            .get_or_init(|| match tiktoken_rs::cl100k_base() {
                Ok(bpe) => Some(Arc::new(bpe)),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load cl100k_base, using character heuristic");
                    None
                }
            })
            .clone()
    }

    fn encoder(&self, model_hint: &str) -> Option<Arc<CoreBPE>> {
        if let Some(cached) = self.encoders.get(model_hint) {
            return cached.value().clone();
        }
        let encoder = match tiktoken_rs::get_bpe_from_model(model_hint) {
            Ok(bpe) => Some(Arc::new(bpe)),
            Err(_) => {
                tracing::warn!(model = model_hint, "No tokenizer for model, counting with cl100k_base");
                self.fallback()
            }
        };
        self.encoders
            .entry(model_hint.to_string())
            .or_insert(encoder)
            .value()
            .clone()
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, messages: &[ChatMessage], model_hint: &str) -> usize {
        match self.encoder(model_hint) {
            Some(bpe) => count_with(messages, |text| bpe.encode_with_special_tokens(text).len()),
            None => HeuristicEstimator.estimate(messages, model_hint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_accounting() {
        let estimator = HeuristicEstimator;
        assert_eq!(estimator.estimate(&[], "any"), 3);

        // 4 framing + ceil(5/4)=2 content + 3 reply
        let messages = vec![ChatMessage::user("hello")];
        assert_eq!(estimator.estimate(&messages, "any"), 9);

        // name adds ceil(3/4)=1 and takes one back
        let named = vec![ChatMessage::user("hello").with_name("bob")];
        assert_eq!(estimator.estimate(&named, "any"), 9);

        // absent content costs only the framing
        let empty_system = vec![ChatMessage::system(None)];
        assert_eq!(estimator.estimate(&empty_system, "any"), 7);
    }

    #[test]
    fn test_tiktoken_known_and_unknown_models() {
        let estimator = TiktokenEstimator::new();
        let messages = vec![
            ChatMessage::system(Some("You are helpful".to_string())),
            ChatMessage::user("hi"),
        ];
        let known = estimator.estimate(&messages, "gpt-4");
        let unknown = estimator.estimate(&messages, "some-local-model:7b");
        // gpt-4 uses cl100k_base as well
        assert_eq!(known, unknown);
        assert!(known > 2 * TOKENS_PER_MESSAGE + REPLY_FRAMING_TOKENS);
        assert_eq!(estimator.estimate(&messages, "some-local-model:7b"), unknown);
    }

    #[test]
    fn test_estimate_grows_with_messages() {
        let estimator = TiktokenEstimator::new();
        let mut messages = vec![ChatMessage::system(None)];
        let mut last = estimator.estimate(&messages, "llama3");
        for text in ["hi", "hello there", "how are you doing today?"] {
            messages.push(ChatMessage::user(text));
            let next = estimator.estimate(&messages, "llama3");
            assert!(next > last);
            last = next;
        }
    }
}
