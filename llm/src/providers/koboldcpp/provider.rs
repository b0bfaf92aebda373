use super::api::{GenerateRequest, GenerateResponse, ModelResponse, render_prompt};
use crate::client::{Auth, Client, LIST_MODELS_TIMEOUT, endpoint};
use crate::{Backend, BackendDescriptor, CompletionCall, LlmError, RequestTimeout, traffic_log};
use async_trait::async_trait;

static DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    key: "koboldcpp",
    display_name: "KoboldCpp",
    default_host: Some("http://localhost:1551"),
    requires_api_key: false,
};

#[derive(Clone, Default)]
pub struct KoboldCppBackend {
    client: Client,
}

impl KoboldCppBackend {
    pub fn new(client: Client) -> Self {
        KoboldCppBackend { client }
    }
}

#[async_trait]
impl Backend for KoboldCppBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    async fn probe(&self, host: &str, _api_key: Option<&str>) -> bool {
        match self.client.check(&endpoint(host, "api/v1/model"), Auth::None).await {
            Ok(available) => available,
            Err(e) => {
                tracing::error!(backend = DESCRIPTOR.key, host, error = %e, "Error checking host availability");
                false
            }
        }
    }

    async fn list_models(&self, host: &str, _api_key: Option<&str>) -> Vec<String> {
        let response: Result<ModelResponse, _> = self
            .client
            .get(
                &endpoint(host, "api/v1/model"),
                Auth::None,
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
        let request = GenerateRequest::new(render_prompt(call));
        traffic_log::log_request(DESCRIPTOR.key, call.model, &request);

        let result = self
            .client
            .post::<_, GenerateResponse>(
                &endpoint(call.host, "api/v1/generate"),
                Auth::None,
                &request,
                call.timeout,
            )
            .await
            .and_then(GenerateResponse::into_text);

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
