use async_trait::async_trait;

pub mod api;
mod client;
pub mod error;
pub mod providers;
pub mod registry;
pub mod traffic_log;

pub use api::*;
pub use client::Client;
pub use error::LlmError;
pub use registry::BackendRegistry;

/// Static facts about a backend, used by configuration flows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendDescriptor {
    /// Registry key, lowercase.
    pub key: &'static str,
    pub display_name: &'static str,
    pub default_host: Option<&'static str>,
    pub requires_api_key: bool,
}

/// Capability contract every LLM backend adapter implements.
///
/// `probe` and `list_models` are advisory: they swallow and log every
/// failure. `complete` is the request path and propagates failures.
#[async_trait]
pub trait Backend: Send + Sync {
    fn descriptor(&self) -> &BackendDescriptor;

    /// Reachability/auth check with a short deadline.
    async fn probe(&self, host: &str, api_key: Option<&str>) -> bool;

    /// Model identifiers served by `host`, empty on any failure.
    async fn list_models(&self, host: &str, api_key: Option<&str>) -> Vec<String>;

    /// Run one generation call and return the response text.
    async fn complete(&self, call: &CompletionCall<'_>) -> Result<String, LlmError>;
}
