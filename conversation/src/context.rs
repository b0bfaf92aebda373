//! Per-conversation message history with token-budget trimming.
//!
//! Conversations live in a sharded map so that turns on different chat ids
//! never contend on a single lock. Index 0 holds the system message when
//! there is one; everything else is in chronological order.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use llm::{ChatMessage, Role};
use serde::{Deserialize, Serialize};

use crate::estimator::{TiktokenEstimator, TokenEstimator};

/// External chat identifier, kept as an opaque string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<i64> for ConversationId {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("Conversation {0} does not exist")]
    UnknownConversation(ConversationId),

    #[error("Conversation {0} already has messages; a system message must come first")]
    MisplacedSystemMessage(ConversationId),
}

/// Owner of every conversation's message sequence.
pub struct ContextManager {
    conversations: DashMap<ConversationId, Vec<ChatMessage>>,
    estimator: Arc<dyn TokenEstimator>,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(Arc::new(TiktokenEstimator::new()))
    }
}

impl ContextManager {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        ContextManager {
            conversations: DashMap::new(),
            estimator,
        }
    }

    /// Creates `[system(system_prompt)]` for `id` unless it already exists.
    pub fn ensure(&self, id: &ConversationId, system_prompt: Option<&str>) {
        self.conversations.entry(id.clone()).or_insert_with(|| {
            tracing::debug!(conversation = %id, "Creating conversation");
            vec![ChatMessage::system(system_prompt.map(str::to_string))]
        });
    }

    /// Appends a message, creating an empty conversation if needed.
    pub fn append(
        &self,
        id: &ConversationId,
        role: Role,
        content: impl Into<String>,
    ) -> Result<(), ContextError> {
        let mut messages = self.conversations.entry(id.clone()).or_default();
        if role == Role::System && !messages.is_empty() {
            return Err(ContextError::MisplacedSystemMessage(id.clone()));
        }
        messages.push(ChatMessage::new(role, Some(content.into())));
        Ok(())
    }

    /// Evicts the oldest non-system messages until the estimate fits
    /// `max_tokens` or a single message is left. Returns how many were removed.
    pub fn enforce_budget(
        &self,
        id: &ConversationId,
        model_hint: &str,
        max_tokens: usize,
    ) -> Result<usize, ContextError> {
        let mut messages = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| ContextError::UnknownConversation(id.clone()))?;

        let mut evicted = 0;
        while messages.len() > 1 && self.estimator.estimate(&messages, model_hint) > max_tokens {
            let oldest = if messages[0].role == Role::System { 1 } else { 0 };
            messages.remove(oldest);
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(
                conversation = %id,
                evicted,
                remaining = messages.len(),
                max_tokens,
                "Trimmed conversation to token budget"
            );
        }
        Ok(evicted)
    }

    /// Copy of the history to send to a backend. A leading system message
    /// with no text is left out.
    pub fn dispatch_view(&self, id: &ConversationId) -> Result<Vec<ChatMessage>, ContextError> {
        let messages = self
            .conversations
            .get(id)
            .ok_or_else(|| ContextError::UnknownConversation(id.clone()))?;
        let skip = match messages.first() {
            Some(first) if first.role == Role::System && first.is_blank() => 1,
            _ => 0,
        };
        Ok(messages[skip..].to_vec())
    }

    /// Drops the history of `id`, leaving only a fresh system message.
    pub fn reset(&self, id: &ConversationId, system_prompt: Option<&str>) {
        self.conversations.insert(
            id.clone(),
            vec![ChatMessage::system(system_prompt.map(str::to_string))],
        );
    }

    /// Rewrites the system message of every conversation.
    pub fn update_system_prompt(&self, system_prompt: Option<&str>) {
        for mut entry in self.conversations.iter_mut() {
            let messages = entry.value_mut();
            let content = system_prompt.map(str::to_string);
            if messages.first().is_some_and(|m| m.role == Role::System) {
                messages[0].content = content;
            } else {
                messages.insert(0, ChatMessage::system(content));
            }
        }
    }

    pub fn messages(&self, id: &ConversationId) -> Option<Vec<ChatMessage>> {
        self.conversations.get(id).map(|m| m.value().clone())
    }

    /// Number of stored messages, 0 for an unknown id.
    pub fn len(&self, id: &ConversationId) -> usize {
        self.conversations.get(id).map(|m| m.len()).unwrap_or(0)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversations.contains_key(id)
    }

    pub fn estimate(&self, id: &ConversationId, model_hint: &str) -> Result<usize, ContextError> {
        let messages = self
            .conversations
            .get(id)
            .ok_or_else(|| ContextError::UnknownConversation(id.clone()))?;
        Ok(self.estimator.estimate(&messages, model_hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::HeuristicEstimator;

    fn manager() -> ContextManager {
        ContextManager::new(Arc::new(HeuristicEstimator))
    }

    /// 2000 characters is 500 heuristic tokens.
    fn five_hundred_tokens(tag: &str) -> String {
        format!("{}{}", tag, "x".repeat(2000 - tag.len()))
    }

    #[test]
    fn test_conversation_id_conversions() {
        assert_eq!(ConversationId::from(-1001234567890i64).as_str(), "-1001234567890");
        assert_eq!(ConversationId::from("c1"), ConversationId::from("c1".to_string()));
        assert_eq!(serde_json::to_string(&ConversationId::from("c1")).unwrap(), r#""c1""#);
    }

    #[test]
    fn test_ensure_creates_system_message_once() {
        let contexts = manager();
        let id = ConversationId::from("c1");
        contexts.ensure(&id, Some("You are helpful"));
        contexts.ensure(&id, Some("Ignored"));

        let messages = contexts.messages(&id).unwrap();
        assert_eq!(messages, vec![ChatMessage::system(Some("You are helpful".to_string()))]);
    }

    #[test]
    fn test_small_exchange_fits_budget() {
        let contexts = manager();
        let id = ConversationId::from("c1");
        contexts.ensure(&id, Some("You are helpful"));
        contexts.append(&id, Role::User, "hi").unwrap();
        contexts.append(&id, Role::Assistant, "hello").unwrap();

        assert_eq!(contexts.enforce_budget(&id, "gpt-4", 1000).unwrap(), 0);
        assert_eq!(contexts.len(&id), 3);
    }

    #[test]
    fn test_oldest_pair_evicted_first() {
        let contexts = manager();
        let id = ConversationId::from("c1");
        contexts.ensure(&id, Some("You are helpful"));
        for turn in 1..=3 {
            contexts
                .append(&id, Role::User, five_hundred_tokens(&format!("u{turn}")))
                .unwrap();
            contexts
                .append(&id, Role::Assistant, five_hundred_tokens(&format!("a{turn}")))
                .unwrap();
        }

        let evicted = contexts.enforce_budget(&id, "gpt-4", 2048).unwrap();
        assert_eq!(evicted, 2);

        let messages = contexts.messages(&id).unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].get_text(), "You are helpful");
        assert!(messages[1].get_text().starts_with("u2"));
        assert!(messages[4].get_text().starts_with("a3"));
        assert!(contexts.estimate(&id, "gpt-4").unwrap() <= 2048);
    }

    #[test]
    fn test_budget_leaves_single_message() {
        let contexts = manager();
        let id = ConversationId::from("c1");
        contexts.ensure(&id, Some("You are helpful"));
        contexts.append(&id, Role::User, five_hundred_tokens("u")).unwrap();

        // The user message alone overflows, so it goes and the system message stays.
        assert_eq!(contexts.enforce_budget(&id, "gpt-4", 10).unwrap(), 1);
        let messages = contexts.messages(&id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::System);

        assert_eq!(contexts.enforce_budget(&id, "gpt-4", 0).unwrap(), 0);
        assert_eq!(contexts.len(&id), 1);
    }

    #[test]
    fn test_eviction_without_system_message() {
        let contexts = manager();
        let id = ConversationId::from("c1");
        contexts.append(&id, Role::User, five_hundred_tokens("first")).unwrap();
        contexts.append(&id, Role::User, five_hundred_tokens("second")).unwrap();

        assert_eq!(contexts.enforce_budget(&id, "gpt-4", 600).unwrap(), 1);
        let messages = contexts.messages(&id).unwrap();
        assert!(messages[0].get_text().starts_with("second"));
    }

    #[test]
    fn test_unknown_conversation() {
        let contexts = manager();
        let id = ConversationId::from("nope");
        assert_eq!(
            contexts.enforce_budget(&id, "gpt-4", 100),
            Err(ContextError::UnknownConversation(id.clone()))
        );
        assert!(contexts.dispatch_view(&id).is_err());
        assert!(!contexts.contains(&id));
        assert_eq!(contexts.len(&id), 0);
    }

    #[test]
    fn test_system_message_only_first() {
        let contexts = manager();
        let id = ConversationId::from("c1");
        contexts.append(&id, Role::System, "be brief").unwrap();
        assert_eq!(
            contexts.append(&id, Role::System, "be verbose"),
            Err(ContextError::MisplacedSystemMessage(id.clone()))
        );
        assert_eq!(contexts.len(&id), 1);
    }

    #[test]
    fn test_dispatch_view_omits_blank_system_message() {
        let contexts = manager();
        let id = ConversationId::from("c1");
        contexts.ensure(&id, None);
        contexts.append(&id, Role::User, "hi").unwrap();

        let view = contexts.dispatch_view(&id).unwrap();
        assert_eq!(view, vec![ChatMessage::user("hi")]);
        // Storage keeps the system slot.
        assert_eq!(contexts.len(&id), 2);

        let other = ConversationId::from("c2");
        contexts.ensure(&other, Some("You are helpful"));
        contexts.append(&other, Role::User, "hi").unwrap();
        assert_eq!(contexts.dispatch_view(&other).unwrap().len(), 2);
    }

    #[test]
    fn test_reset_and_update_system_prompt() {
        let contexts = manager();
        let with_system = ConversationId::from("c1");
        let without_system = ConversationId::from("c2");
        contexts.ensure(&with_system, Some("old"));
        contexts.append(&with_system, Role::User, "hi").unwrap();
        contexts.append(&without_system, Role::User, "hello").unwrap();

        contexts.update_system_prompt(Some("new"));
        assert_eq!(contexts.messages(&with_system).unwrap()[0].get_text(), "new");
        let messages = contexts.messages(&without_system).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system(Some("new".to_string())));

        contexts.reset(&with_system, Some("fresh"));
        assert_eq!(
            contexts.messages(&with_system).unwrap(),
            vec![ChatMessage::system(Some("fresh".to_string()))]
        );
    }

    #[test]
    fn test_estimate_is_monotonic_and_deterministic() {
        let contexts = ContextManager::default();
        let id = ConversationId::from("c1");
        contexts.ensure(&id, Some("You are helpful"));
        let mut last = contexts.estimate(&id, "gpt-4o").unwrap();
        for text in ["a", "bb", "a longer message with several words"] {
            contexts.append(&id, Role::User, text).unwrap();
            let next = contexts.estimate(&id, "gpt-4o").unwrap();
            assert!(next >= last);
            assert_eq!(contexts.estimate(&id, "gpt-4o").unwrap(), next);
            last = next;
        }
    }
}
