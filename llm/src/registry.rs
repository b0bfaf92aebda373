//! Lookup of backend adapters by key.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::providers::{GeminiBackend, KoboldCppBackend, OllamaBackend, OpenAIBackend};
use crate::{Backend, BackendDescriptor, Client, CompletionCall, LlmError};

/// Fixed set of backends, keyed by lowercase name.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in adapter, sharing one HTTP client.
    pub fn with_defaults() -> Self {
        let client = Client::new();
        let mut registry = Self::new();
        registry.register(Arc::new(OpenAIBackend::new(client.clone())));
        registry.register(Arc::new(OllamaBackend::new(client.clone())));
        registry.register(Arc::new(GeminiBackend::new(client.clone())));
        registry.register(Arc::new(KoboldCppBackend::new(client)));
        registry
    }

    /// Adds `backend` under its descriptor key, replacing any previous entry.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        let key = backend.descriptor().key.to_lowercase();
        self.backends.insert(key, backend);
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn Backend>, LlmError> {
        self.backends
            .get(&key.to_lowercase())
            .cloned()
            .ok_or_else(|| LlmError::UnsupportedBackend(key.to_string()))
    }

    /// Looks up `key` and checks that a key is present when the backend needs one.
    pub fn resolve(&self, key: &str, api_key: Option<&str>) -> Result<Arc<dyn Backend>, LlmError> {
        let backend = self.get(key)?;
        let descriptor = backend.descriptor();
        let has_key = api_key.is_some_and(|k| !k.trim().is_empty());
        if descriptor.requires_api_key && !has_key {
            return Err(LlmError::MissingApiKey(descriptor.display_name.to_string()));
        }
        Ok(backend)
    }

    pub fn descriptors(&self) -> Vec<&BackendDescriptor> {
        self.backends.values().map(|b| b.descriptor()).collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub async fn probe(&self, key: &str, host: &str, api_key: Option<&str>) -> bool {
        match self.get(key) {
            Ok(backend) => backend.probe(host, api_key).await,
            Err(e) => {
                tracing::warn!(error = %e, "Probe requested for unknown backend");
                false
            }
        }
    }

    pub async fn list_models(&self, key: &str, host: &str, api_key: Option<&str>) -> Vec<String> {
        match self.get(key) {
            Ok(backend) => backend.list_models(host, api_key).await,
            Err(e) => {
                tracing::warn!(error = %e, "Model listing requested for unknown backend");
                Vec::new()
            }
        }
    }

    pub async fn complete(&self, key: &str, call: &CompletionCall<'_>) -> Result<String, LlmError> {
        self.get(key)?.complete(call).await
    }
}
