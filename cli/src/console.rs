use std::io::{self, Write};

use async_trait::async_trait;
use config::ParseMode;
use conversation::ConversationId;
use courier_core::{ChannelError, MessageRef, OutputChannel};

/// Prints replies to stdout. The terminal has no markup, so formatting is ignored.
pub struct ConsoleChannel;

#[async_trait]
impl OutputChannel for ConsoleChannel {
    async fn send_chunk(
        &self,
        _id: &ConversationId,
        text: &str,
        _reply_to: Option<MessageRef>,
        _format: Option<ParseMode>,
    ) -> Result<(), ChannelError> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", text).map_err(|e| ChannelError::Other(e.to_string()))?;
        stdout.flush().map_err(|e| ChannelError::Other(e.to_string()))
    }

    async fn signal_activity(&self, id: &ConversationId) -> Result<(), ChannelError> {
        tracing::debug!(conversation = %id, "Waiting for backend");
        Ok(())
    }
}
