use crate::api::{ChatMessage, CompletionCall, Role};
use crate::error::LlmError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ModelDefinition {
    #[serde(default)]
    pub(crate) name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ListModelsResponse {
    #[serde(default)]
    pub(crate) models: Vec<ModelDefinition>,
}

impl ListModelsResponse {
    /// Model ids with the `models/` resource prefix removed.
    pub(crate) fn into_ids(self) -> Vec<String> {
        self.models
            .into_iter()
            .filter_map(|m| m.name)
            .map(|name| match name.rsplit_once('/') {
                Some((_, id)) => id.to_string(),
                None => name,
            })
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct Part {
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) role: Option<&'static str>,
    pub(crate) parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&'static str>, text: &str) -> Self {
        Content {
            role,
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

fn gemini_role(role: Role) -> Option<&'static str> {
    match role {
        Role::User => Some("user"),
        Role::Assistant => Some("model"),
        // System text travels in `systemInstruction`.
        Role::System => None,
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub(crate) contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_instruction: Option<Content>,
}

impl GenerateContentRequest {
    pub(crate) fn from_call(call: &CompletionCall<'_>) -> Self {
        let contents = call
            .messages
            .iter()
            .filter_map(|msg: &ChatMessage| {
                gemini_role(msg.role).map(|role| Content::text(Some(role), msg.get_text()))
            })
            .collect();
        GenerateContentRequest {
            contents,
            system_instruction: call
                .effective_system_prompt()
                .map(|prompt| Content::text(None, prompt)),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub(crate) parts: Vec<Part>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub(crate) content: Option<CandidateContent>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    pub(crate) fn into_text(self) -> Result<String, LlmError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response contained no candidates".to_string()))?;
        Ok(candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default())
    }
}
