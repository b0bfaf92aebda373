//! The outbound side of a turn: where reply chunks and typing signals go.

use std::time::Duration;

use async_trait::async_trait;
use config::ParseMode;
use conversation::ConversationId;

/// Identifier of a message on the output channel, used for reply threading.
pub type MessageRef = i64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The channel could not render the markup in the text.
    #[error("Formatting rejected: {0}")]
    FormattingRejected(String),

    #[error("Rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("{0}")]
    Other(String),
}

/// A chat surface that can deliver text and show activity.
#[async_trait]
pub trait OutputChannel: Send + Sync {
    /// Deliver one chunk. `format` is `None` for plain text.
    async fn send_chunk(
        &self,
        id: &ConversationId,
        text: &str,
        reply_to: Option<MessageRef>,
        format: Option<ParseMode>,
    ) -> Result<(), ChannelError>;

    /// Show that a reply is being prepared (e.g. a typing indicator).
    async fn signal_activity(&self, id: &ConversationId) -> Result<(), ChannelError>;
}
