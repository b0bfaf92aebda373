use std::time::Duration;

use crate::api::RequestTimeout;

/// Maximum characters of an error body kept in `LlmError::Status`.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Failures surfaced by the registry and by `Backend::complete`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("API '{0}' is not supported")]
    UnsupportedBackend(String),

    #[error("API key is required for {0}")]
    MissingApiKey(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl LlmError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: RequestTimeout) -> Self {
        if err.is_timeout() {
            return LlmError::Timeout(timeout.duration().unwrap_or_default());
        }
        if err.is_connect() {
            return LlmError::Connection(err.to_string());
        }
        if err.is_decode() || err.is_body() {
            return LlmError::InvalidResponse(err.to_string());
        }
        LlmError::Transport(err.to_string())
    }

    pub(crate) fn status(status: reqwest::StatusCode, body: &str) -> Self {
        LlmError::Status {
            status: status.as_u16(),
            body: truncate(body.trim(), MAX_ERROR_BODY_CHARS),
        }
    }

    /// Configuration problems are not worth retrying until the setup changes.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LlmError::UnsupportedBackend(_) | LlmError::MissingApiKey(_)
        )
    }
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}... ({} chars total)", truncated, char_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_is_truncated() {
        let body = "x".repeat(500);
        let err = LlmError::status(reqwest::StatusCode::BAD_GATEWAY, &body);
        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 502);
                assert!(body.ends_with("(500 chars total)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            LlmError::UnsupportedBackend("Foo".to_string()).to_string(),
            "API 'Foo' is not supported"
        );
        assert_eq!(
            LlmError::Timeout(Duration::from_secs(120)).to_string(),
            "Request timed out after 120s"
        );
        assert!(LlmError::MissingApiKey("Gemini".to_string()).is_configuration());
        assert!(!LlmError::Connection("refused".to_string()).is_configuration());
    }
}
