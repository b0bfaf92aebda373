use crate::api::{ChatMessage, CompletionCall, Role};
use crate::error::LlmError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize)]
pub(crate) struct Message<'a> {
    pub(crate) role: Role,
    pub(crate) content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<&'a str>,
}

impl<'a> From<&'a ChatMessage> for Message<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Message {
            role: msg.role,
            content: msg.get_text(),
            name: msg.name.as_deref(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) messages: Vec<Message<'a>>,
}

impl<'a> ChatCompletionRequest<'a> {
    pub(crate) fn from_call(call: &CompletionCall<'a>) -> Self {
        ChatCompletionRequest {
            model: call.model,
            messages: call.messages.iter().map(Message::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ChatCompletionChoice {
    pub(crate) message: ResponseMessage,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub(crate) choices: Vec<ChatCompletionChoice>,
}

impl ChatCompletionResponse {
    pub(crate) fn into_text(self) -> Result<String, LlmError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Model {
    pub(crate) id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ListModelsResponse {
    #[serde(default)]
    pub(crate) data: Vec<Model>,
}
