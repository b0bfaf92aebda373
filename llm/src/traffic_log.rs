//! Traffic logging for backend calls
//!
//! Emits request/response summaries on the `llm::traffic` target.
//! Content is truncated to avoid leaking private data in logs.

use crate::error::truncate;

/// Maximum characters to log for content (to protect privacy)
const MAX_CONTENT_LOG_CHARS: usize = 200;

/// Log a backend request (truncated summary only)
pub fn log_request(backend: &str, model: &str, request: &impl serde::Serialize) {
    let json = serde_json::to_string(request).unwrap_or_else(|_| "<serialization error>".to_string());
    tracing::debug!(
        target: "llm::traffic",
        backend,
        model,
        request = %truncate(&json, MAX_CONTENT_LOG_CHARS),
        "REQUEST"
    );
}

/// Log the text a backend produced (truncated summary only)
pub fn log_response(backend: &str, model: &str, text: &str) {
    tracing::debug!(
        target: "llm::traffic",
        backend,
        model,
        chars = text.chars().count(),
        response = %truncate(text, MAX_CONTENT_LOG_CHARS),
        "RESPONSE"
    );
}

/// Log a failed backend call
pub fn log_error(backend: &str, model: &str, error: &str) {
    tracing::error!(target: "llm::traffic", backend, model, error, "ERROR");
}
