//! One user turn: record the message, call the backend, deliver the reply.

use std::sync::Arc;

use config::{ParseMode, TurnConfig};
use conversation::{ContextError, ContextManager, ConversationId};
use llm::{BackendRegistry, CompletionCall, LlmError, RequestTimeout, Role};
use tracing::instrument;

use crate::channel::{ChannelError, MessageRef, OutputChannel};
use crate::chunk::{DEFAULT_CHUNK_SIZE, split_into_chunks};
use crate::heartbeat::Heartbeat;

const EMPTY_RESPONSE_NOTICE: &str = "Error: Empty response from API";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Backend(#[from] LlmError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was stored and emitted; some chunks may have failed to send.
    Replied { chunks_sent: usize, chunks_failed: usize },
    /// The backend answered with no text.
    Empty,
    Failed(TurnError),
}

pub struct Orchestrator {
    registry: Arc<BackendRegistry>,
    contexts: Arc<ContextManager>,
    heartbeat: Heartbeat,
    chunk_size: usize,
}

impl Orchestrator {
    pub fn new(registry: Arc<BackendRegistry>, contexts: Arc<ContextManager>) -> Self {
        Orchestrator {
            registry,
            contexts,
            heartbeat: Heartbeat::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn contexts(&self) -> &Arc<ContextManager> {
        &self.contexts
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// Handles one incoming user message end to end.
    ///
    /// Failures are reported to `channel` as an `Error: ...` message and
    /// returned in the outcome; nothing is appended to the history for them.
    #[instrument(
        skip(self, user_text, config, channel),
        fields(conversation = %id, backend = %config.backend, model = %config.model)
    )]
    pub async fn handle_turn(
        &self,
        id: &ConversationId,
        user_text: &str,
        reply_to: Option<MessageRef>,
        config: &TurnConfig,
        channel: Arc<dyn OutputChannel>,
    ) -> TurnOutcome {
        self.contexts.ensure(id, config.system_prompt.as_deref());
        if let Err(e) = self.contexts.append(id, Role::User, user_text) {
            let error = TurnError::from(e);
            self.report_error(id, &error, channel.as_ref()).await;
            return TurnOutcome::Failed(error);
        }
        self.dispatch(id, reply_to, config, channel).await
    }

    async fn dispatch(
        &self,
        id: &ConversationId,
        reply_to: Option<MessageRef>,
        config: &TurnConfig,
        channel: Arc<dyn OutputChannel>,
    ) -> TurnOutcome {
        let _heartbeat = self.heartbeat.start(id, channel.clone());

        let text = match self.generate(id, config).await {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(error = %error, "Turn failed");
                self.report_error(id, &error, channel.as_ref()).await;
                return TurnOutcome::Failed(error);
            }
        };

        if text.is_empty() {
            tracing::warn!("Backend returned an empty response");
            if let Err(e) = channel.send_chunk(id, EMPTY_RESPONSE_NOTICE, None, None).await {
                tracing::error!(error = %e, "Failed to send empty response notice");
            }
            return TurnOutcome::Empty;
        }

        if let Err(e) = self.contexts.append(id, Role::Assistant, text.as_str()) {
            let error = TurnError::from(e);
            self.report_error(id, &error, channel.as_ref()).await;
            return TurnOutcome::Failed(error);
        }

        let (chunks_sent, chunks_failed) = self
            .emit(id, &text, reply_to, config.parse_mode, channel.as_ref())
            .await;
        tracing::info!(chunks_sent, chunks_failed, chars = text.chars().count(), "Reply delivered");
        TurnOutcome::Replied {
            chunks_sent,
            chunks_failed,
        }
    }

    async fn generate(&self, id: &ConversationId, config: &TurnConfig) -> Result<String, TurnError> {
        // Resolved first so a turn that cannot be sent evicts nothing.
        let backend = self
            .registry
            .resolve(&config.backend, config.api_key.as_deref())?;
        self.contexts
            .enforce_budget(id, &config.model, config.max_context_tokens)?;
        let messages = self.contexts.dispatch_view(id)?;

        let call = CompletionCall::new(&config.host, &config.model, &messages)
            .with_api_key(config.api_key.as_deref())
            .with_system_prompt(config.system_prompt.as_deref())
            .with_timeout(RequestTimeout::from_secs(config.timeout_secs));
        tracing::debug!(messages = messages.len(), timeout = %call.timeout, "Dispatching to backend");

        Ok(backend.complete(&call).await?)
    }

    async fn emit(
        &self,
        id: &ConversationId,
        text: &str,
        reply_to: Option<MessageRef>,
        parse_mode: ParseMode,
        channel: &dyn OutputChannel,
    ) -> (usize, usize) {
        let format = parse_mode.is_formatted().then_some(parse_mode);
        let mut sent = 0;
        let mut failed = 0;

        for (index, chunk) in split_into_chunks(text, self.chunk_size).into_iter().enumerate() {
            let reply = if index == 0 { reply_to } else { None };
            let mut result = channel.send_chunk(id, chunk, reply, format).await;

            if format.is_some() {
                if let Err(ChannelError::FormattingRejected(reason)) = &result {
                    tracing::warn!(chunk = index, reason = %reason, "Formatting rejected, resending as plain text");
                    result = channel.send_chunk(id, chunk, reply, None).await;
                }
            }

            match result {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::error!(chunk = index, error = %e, "Failed to send chunk");
                    failed += 1;
                }
            }
        }
        (sent, failed)
    }

    async fn report_error(&self, id: &ConversationId, error: &TurnError, channel: &dyn OutputChannel) {
        let notice = format!("Error: {}", error);
        if let Err(e) = channel.send_chunk(id, &notice, None, None).await {
            tracing::error!(error = %e, "Failed to report error to channel");
        }
    }
}
