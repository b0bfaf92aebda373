use super::api::{ListModelsResponse, OllamaRequest, OllamaResponse};
use crate::client::{Auth, Client, LIST_MODELS_TIMEOUT, endpoint};
use crate::{Backend, BackendDescriptor, CompletionCall, LlmError, RequestTimeout, traffic_log};
use async_trait::async_trait;

static DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    key: "ollama",
    display_name: "Ollama",
    default_host: Some("http://localhost:11434"),
    requires_api_key: false,
};

#[derive(Clone, Default)]
pub struct OllamaBackend {
    client: Client,
}

impl OllamaBackend {
    pub fn new(client: Client) -> Self {
        OllamaBackend { client }
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    async fn probe(&self, host: &str, _api_key: Option<&str>) -> bool {
        match self.client.check(&endpoint(host, "api/tags"), Auth::None).await {
            Ok(available) => available,
            Err(e) => {
                tracing::error!(backend = DESCRIPTOR.key, host, error = %e, "Error checking host availability");
                false
            }
        }
    }

    async fn list_models(&self, host: &str, _api_key: Option<&str>) -> Vec<String> {
        let response: Result<ListModelsResponse, _> = self
            .client
            .get(
                &endpoint(host, "api/tags"),
                Auth::None,
                RequestTimeout::After(LIST_MODELS_TIMEOUT),
            )
            .await;
        match response {
            Ok(response) => response.models.into_iter().map(|m| m.name).collect(),
            Err(e) => {
                tracing::error!(backend = DESCRIPTOR.key, host, error = %e, "Error fetching models");
                Vec::new()
            }
        }
    }

    async fn complete(&self, call: &CompletionCall<'_>) -> Result<String, LlmError> {
        let request = OllamaRequest::from_call(call);
        traffic_log::log_request(DESCRIPTOR.key, call.model, &request);

        // Ollama itself ignores auth, but proxies in front of it often expect a bearer token.
        let result = self
            .client
            .post::<_, OllamaResponse>(
                &endpoint(call.host, "api/chat"),
                Auth::bearer(call.api_key),
                &request,
                call.timeout,
            )
            .await
            .map(OllamaResponse::into_text);

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
