use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of a conversation.
///
/// `content` is optional because a conversation keeps its system slot even
/// when no system prompt is configured.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize, Default)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: Option<String>) -> Self {
        ChatMessage {
            role,
            content,
            name: None,
        }
    }

    pub fn system(content: Option<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Some(content.into()))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Some(content.into()))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Text content, or the empty string when absent.
    pub fn get_text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// True when there is no content or it is only whitespace.
    pub fn is_blank(&self) -> bool {
        self.get_text().trim().is_empty()
    }
}

/// Deadline applied to a completion request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RequestTimeout {
    /// Block until the backend answers.
    #[default]
    Unbounded,
    After(Duration),
}

impl RequestTimeout {
    /// Whole seconds, where `0` means no deadline.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            RequestTimeout::Unbounded
        } else {
            RequestTimeout::After(Duration::from_secs(secs))
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            RequestTimeout::Unbounded => None,
            RequestTimeout::After(d) => Some(*d),
        }
    }
}

impl fmt::Display for RequestTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestTimeout::Unbounded => write!(f, "no timeout"),
            RequestTimeout::After(d) => write!(f, "{}s", d.as_secs_f64()),
        }
    }
}

/// Everything an adapter needs for one generation call.
#[derive(Copy, Clone)]
pub struct CompletionCall<'a> {
    pub host: &'a str,
    pub model: &'a str,
    pub api_key: Option<&'a str>,
    pub messages: &'a [ChatMessage],
    pub system_prompt: Option<&'a str>,
    pub timeout: RequestTimeout,
}

impl<'a> CompletionCall<'a> {
    pub fn new(host: &'a str, model: &'a str, messages: &'a [ChatMessage]) -> Self {
        CompletionCall {
            host,
            model,
            api_key: None,
            messages,
            system_prompt: None,
            timeout: RequestTimeout::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<&'a str>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<&'a str>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn with_timeout(mut self, timeout: RequestTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// The system prompt to hand to backends that take it out of band:
    /// the explicit prompt if set, otherwise a non-blank leading system message.
    pub fn effective_system_prompt(&self) -> Option<&'a str> {
        self.system_prompt.filter(|p| !p.trim().is_empty()).or_else(|| {
            self.messages
                .first()
                .filter(|m| m.role == Role::System && !m.is_blank())
                .and_then(|m| m.content.as_deref())
        })
    }
}

impl fmt::Debug for CompletionCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionCall")
            .field("host", &self.host)
            .field("model", &self.model)
            .field("api_key", &self.api_key.map(|_| "***"))
            .field("messages", &self.messages.len())
            .field("system_prompt", &self.system_prompt.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization_skips_missing_name() {
        let json = serde_json::to_string(&ChatMessage::user("Hello")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"Hello"}"#);

        let json = serde_json::to_string(&ChatMessage::system(None)).unwrap();
        assert_eq!(json, r#"{"role":"system","content":null}"#);
    }

    #[test]
    fn test_zero_seconds_is_unbounded() {
        assert_eq!(RequestTimeout::from_secs(0), RequestTimeout::Unbounded);
        assert_eq!(
            RequestTimeout::from_secs(120).duration(),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_effective_system_prompt_prefers_explicit_prompt() {
        let messages = vec![ChatMessage::system(Some("stored".to_string())), ChatMessage::user("hi")];
        let call = CompletionCall::new("http://h", "m", &messages);
        assert_eq!(call.effective_system_prompt(), Some("stored"));

        let call = call.with_system_prompt(Some("explicit"));
        assert_eq!(call.effective_system_prompt(), Some("explicit"));

        let blank = vec![ChatMessage::system(None), ChatMessage::user("hi")];
        let call = CompletionCall::new("http://h", "m", &blank);
        assert_eq!(call.effective_system_prompt(), None);
    }

    #[test]
    fn test_debug_masks_api_key() {
        let messages: Vec<ChatMessage> = Vec::new();
        let call = CompletionCall::new("http://h", "m", &messages).with_api_key(Some("sk-secret"));
        let rendered = format!("{:?}", call);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("***"));
    }
}
