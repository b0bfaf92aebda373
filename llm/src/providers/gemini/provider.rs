use super::api::{GenerateContentRequest, GenerateContentResponse, ListModelsResponse};
use crate::client::{Auth, Client, LIST_MODELS_TIMEOUT, endpoint};
use crate::{Backend, BackendDescriptor, CompletionCall, LlmError, RequestTimeout, traffic_log};
use async_trait::async_trait;

static DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    key: "gemini",
    display_name: "Gemini",
    default_host: Some("https://generativelanguage.googleapis.com"),
    requires_api_key: true,
};

const API_VERSION: &str = "v1beta";

/// Google generative language API. The key travels as a `key` query parameter.
#[derive(Clone, Default)]
pub struct GeminiBackend {
    client: Client,
}

impl GeminiBackend {
    pub fn new(client: Client) -> Self {
        GeminiBackend { client }
    }

    fn models_url(host: &str) -> String {
        endpoint(host, &format!("{}/models", API_VERSION))
    }

    fn generate_url(host: &str, model: &str) -> String {
        endpoint(host, &format!("{}/models/{}:generateContent", API_VERSION, model))
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    async fn probe(&self, host: &str, api_key: Option<&str>) -> bool {
        match self.client.check(&Self::models_url(host), Auth::query_key(api_key)).await {
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
                Auth::query_key(api_key),
                RequestTimeout::After(LIST_MODELS_TIMEOUT),
            )
            .await;
        match response {
            Ok(response) => response.into_ids(),
            Err(e) => {
                tracing::error!(backend = DESCRIPTOR.key, host, error = %e, "Error fetching models");
                Vec::new()
            }
        }
    }

    async fn complete(&self, call: &CompletionCall<'_>) -> Result<String, LlmError> {
        let request = GenerateContentRequest::from_call(call);
        traffic_log::log_request(DESCRIPTOR.key, call.model, &request);

        let result = self
            .client
            .post::<_, GenerateContentResponse>(
                &Self::generate_url(call.host, call.model),
                Auth::query_key(call.api_key),
                &request,
                call.timeout,
            )
            .await
            .and_then(GenerateContentResponse::into_text);

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
