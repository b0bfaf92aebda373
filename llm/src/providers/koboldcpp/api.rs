use crate::api::{CompletionCall, Role};
use crate::error::LlmError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ModelResponse {
    #[serde(default)]
    pub(crate) result: Option<String>,
}

impl ModelResponse {
    /// KoboldCpp serves exactly one model.
    pub(crate) fn into_ids(self) -> Vec<String> {
        self.result.into_iter().filter(|m| !m.is_empty()).collect()
    }
}

/// Flattens a conversation into the single prompt string KoboldCpp expects.
pub(crate) fn render_prompt(call: &CompletionCall<'_>) -> String {
    let mut prompt = String::new();
    if let Some(system) = call.effective_system_prompt() {
        prompt.push_str(system);
        prompt.push('\n');
    }
    for msg in call.messages.iter().filter(|m| m.role != Role::System) {
        prompt.push_str(&format!("{}: {}\n", msg.role, msg.get_text()));
    }
    prompt.push_str("assistant:");
    prompt
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct GenerateRequest {
    pub(crate) prompt: String,
    pub(crate) max_context_length: u32,
    pub(crate) temperature: f32,
    pub(crate) top_p: f32,
    pub(crate) top_k: u32,
    pub(crate) typical_p: f32,
    pub(crate) repetition_penalty: f32,
    pub(crate) repetition_penalty_range: u32,
    pub(crate) repetition_penalty_slope: f32,
    pub(crate) encoder_repetition_penalty: f32,
    pub(crate) no_repeat_ngram_size: u32,
    pub(crate) min_length: u32,
    pub(crate) do_sample: bool,
    pub(crate) early_stopping: bool,
    pub(crate) seed: i64,
    pub(crate) num_beams: u32,
    pub(crate) length_penalty: f32,
    pub(crate) stopping_strings: Vec<String>,
}

impl GenerateRequest {
    pub(crate) fn new(prompt: String) -> Self {
        GenerateRequest {
            prompt,
            max_context_length: 2048,
            temperature: 0.7,
            top_p: 0.92,
            top_k: 100,
            typical_p: 1.0,
            repetition_penalty: 1.07,
            repetition_penalty_range: 2048,
            repetition_penalty_slope: 0.18,
            encoder_repetition_penalty: 1.0,
            no_repeat_ngram_size: 0,
            min_length: 0,
            do_sample: true,
            early_stopping: false,
            seed: -1,
            num_beams: 1,
            length_penalty: 1.0,
            stopping_strings: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct GenerateResult {
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub(crate) results: Vec<GenerateResult>,
}

impl GenerateResponse {
    pub(crate) fn into_text(self) -> Result<String, LlmError> {
        self.results
            .into_iter()
            .next()
            .map(|r| r.text.unwrap_or_default())
            .ok_or_else(|| LlmError::InvalidResponse("response contained no results".to_string()))
    }
}
