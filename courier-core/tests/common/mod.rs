//! In-memory doubles for the output channel and a backend.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use config::{ParseMode, TurnConfig};
use conversation::{ContextManager, ConversationId, HeuristicEstimator};
use courier_core::{ChannelError, Heartbeat, MessageRef, Orchestrator, OutputChannel};
use llm::{Backend, BackendDescriptor, BackendRegistry, ChatMessage, CompletionCall, LlmError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub text: String,
    pub reply_to: Option<MessageRef>,
    pub format: Option<ParseMode>,
}

/// Records everything sent to it. Can be told to reject markup or fail sends.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<Sent>>,
    pub signals: Mutex<usize>,
    pub reject_formatting: bool,
    /// Fails the send with this 0-based attempt index.
    pub fail_attempt: Option<usize>,
    pub attempts: Mutex<usize>,
}

impl RecordingChannel {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn signals(&self) -> usize {
        *self.signals.lock().unwrap()
    }
}

#[async_trait]
impl OutputChannel for RecordingChannel {
    async fn send_chunk(
        &self,
        _id: &ConversationId,
        text: &str,
        reply_to: Option<MessageRef>,
        format: Option<ParseMode>,
    ) -> Result<(), ChannelError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts - 1
        };
        self.sent.lock().unwrap().push(Sent {
            text: text.to_string(),
            reply_to,
            format,
        });
        if self.fail_attempt == Some(attempt) {
            return Err(ChannelError::Other("message is too long".to_string()));
        }
        if self.reject_formatting && format.is_some() {
            return Err(ChannelError::FormattingRejected("can't parse entities".to_string()));
        }
        Ok(())
    }

    async fn signal_activity(&self, _id: &ConversationId) -> Result<(), ChannelError> {
        *self.signals.lock().unwrap() += 1;
        Ok(())
    }
}

pub static SCRIPTED: BackendDescriptor = BackendDescriptor {
    key: "scripted",
    display_name: "Scripted",
    default_host: None,
    requires_api_key: false,
};

pub static SCRIPTED_KEYED: BackendDescriptor = BackendDescriptor {
    key: "keyed",
    display_name: "Keyed",
    default_host: None,
    requires_api_key: true,
};

/// Answers from a queue and remembers what it was sent.
pub struct ScriptedBackend {
    descriptor: &'static BackendDescriptor,
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    delay: Duration,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        ScriptedBackend {
            descriptor: &SCRIPTED,
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn keyed(responses: Vec<Result<String, LlmError>>) -> Self {
        ScriptedBackend {
            descriptor: &SCRIPTED_KEYED,
            ..Self::new(responses)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        self.descriptor
    }

    async fn probe(&self, _host: &str, _api_key: Option<&str>) -> bool {
        true
    }

    async fn list_models(&self, _host: &str, _api_key: Option<&str>) -> Vec<String> {
        vec!["scripted-model".to_string()]
    }

    async fn complete(&self, call: &CompletionCall<'_>) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(call.messages.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub backend: Arc<ScriptedBackend>,
    pub channel: Arc<RecordingChannel>,
}

impl Harness {
    pub fn new(backend: ScriptedBackend) -> Self {
        Self::with_channel(backend, RecordingChannel::default())
    }

    pub fn with_channel(backend: ScriptedBackend, channel: RecordingChannel) -> Self {
        let backend = Arc::new(backend);
        let mut registry = BackendRegistry::new();
        registry.register(backend.clone());
        let contexts = Arc::new(ContextManager::new(Arc::new(HeuristicEstimator)));
        let orchestrator = Orchestrator::new(Arc::new(registry), contexts)
            .with_heartbeat(Heartbeat::new(Duration::from_secs(5)));
        Harness {
            orchestrator,
            backend,
            channel: Arc::new(channel),
        }
    }

    pub fn channel(&self) -> Arc<dyn OutputChannel> {
        self.channel.clone()
    }
}

pub fn turn_config() -> TurnConfig {
    let mut config = TurnConfig::new("scripted", "http://localhost:0", "scripted-model");
    config.system_prompt = Some("You are helpful".to_string());
    config
}
