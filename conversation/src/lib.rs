//! Conversation state: message history per chat and token budgeting.

pub mod context;
pub mod estimator;

pub use context::{ContextError, ContextManager, ConversationId};
pub use estimator::{HeuristicEstimator, TiktokenEstimator, TokenEstimator};
