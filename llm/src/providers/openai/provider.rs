use crate::client::{Auth, Client, LIST_MODELS_TIMEOUT, endpoint};
use crate::{Backend, BackendDescriptor, CompletionCall, LlmError, RequestTimeout, traffic_log};
use async_trait::async_trait;

use super::api::{ChatCompletionRequest, ChatCompletionResponse, ListModelsResponse};

static DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    key: "openai",
    display_name: "OpenAI",
    default_host: Some("https://api.openai.com"),
    requires_api_key: false,
};

const API_VERSION: &str = "v1";

/// Chat-completions dialect: message array, bearer auth.
#[derive(Clone, Default)]
pub struct OpenAIBackend {
    client: Client,
}

impl OpenAIBackend {
    pub fn new(client: Client) -> Self {
        OpenAIBackend { client }
    }

    fn models_url(host: &str) -> String {
        endpoint(host, &format!("{}/models", API_VERSION))
    }

    fn chat_url(host: &str) -> String {
        endpoint(host, &format!("{}/chat/completions", API_VERSION))
    }
}

#[async_trait]
impl Backend for OpenAIBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    async fn probe(&self, host: &str, api_key: Option<&str>) -> bool {
        match self.client.check(&Self::models_url(host), Auth::bearer(api_key)).await {
            Ok(available) => available,
            Err(e) => {
                tracing::error!(backend = DESCRIPTOR.key, host, error = %e, "Error checking host availability");
                false
            }
        }
    }

    async fn list_models(&self, host: &str, api_key: Option<&str>) -> Vec<String> {
        let response: Result<ListModelsResponse, _> = self
            .client
            .get(
                &Self::models_url(host),
                Auth::bearer(api_key),
                RequestTimeout::After(LIST_MODELS_TIMEOUT),
            )
            .await;
        match response {
            Ok(response) => response.data.into_iter().map(|m| m.id).collect(),
            Err(e) => {
                tracing::error!(backend = DESCRIPTOR.key, host, error = %e, "Error fetching models");
                Vec::new()
            }
        }
    }

    async fn complete(&self, call: &CompletionCall<'_>) -> Result<String, LlmError> {
        let request = ChatCompletionRequest::from_call(call);
        traffic_log::log_request(DESCRIPTOR.key, call.model, &request);

        let result = self
            .client
            .post::<_, ChatCompletionResponse>(
                &Self::chat_url(call.host),
                Auth::bearer(call.api_key),
                &request,
                call.timeout,
            )
            .await
            .and_then(ChatCompletionResponse::into_text);

        match result {
            Ok(text) => {
                traffic_log::log_response(DESCRIPTOR.key, call.model, &text);
                Ok(text)
            }
            Err(e) => {
                traffic_log::log_error(DESCRIPTOR.key, call.model, &e.to_string());
                Err(e)
            }
        }
    }
}
