use crate::api::{ChatMessage, CompletionCall, Role};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ModelDefinition {
    pub(crate) name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ListModelsResponse {
    #[serde(default)]
    pub(crate) models: Vec<ModelDefinition>,
}

// Ollama representation of messages.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct Message<'a> {
    pub(crate) role: Role,
    pub(crate) content: &'a str,
}

impl<'a> From<&'a ChatMessage> for Message<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Message {
            role: msg.role,
            content: msg.get_text(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct OllamaRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) messages: Vec<Message<'a>>,
    pub(crate) stream: bool,
}

impl<'a> OllamaRequest<'a> {
    pub(crate) fn from_call(call: &CompletionCall<'a>) -> Self {
        OllamaRequest {
            model: call.model,
            messages: call.messages.iter().map(Message::from).collect(),
            stream: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct OllamaResponse {
    pub(crate) message: ResponseMessage,
}

impl OllamaResponse {
    pub(crate) fn into_text(self) -> String {
        self.message.content.unwrap_or_default()
    }
}
