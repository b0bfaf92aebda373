//! Application settings: `courier.toml` plus `COURIER_*` environment overrides.

use crate::PathManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Setting '{0}' is not configured")]
    Incomplete(&'static str),

    #[error("Invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

/// How reply chunks are marked up for the output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    #[default]
    #[serde(alias = "Markdown")]
    Markdown,
    #[serde(alias = "HTML")]
    Html,
    /// Always send plain text.
    #[serde(rename = "none")]
    Plain,
}

impl ParseMode {
    pub fn is_formatted(&self) -> bool {
        !matches!(self, ParseMode::Plain)
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMode::Markdown => write!(f, "markdown"),
            ParseMode::Html => write!(f, "html"),
            ParseMode::Plain => write!(f, "none"),
        }
    }
}

impl FromStr for ParseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" => Ok(ParseMode::Markdown),
            "html" => Ok(ParseMode::Html),
            "none" | "plain" | "" => Ok(ParseMode::Plain),
            _ => Err(ConfigError::Invalid {
                key: "parse_mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Everything one turn needs to reach a backend.
#[derive(Clone, PartialEq)]
pub struct TurnConfig {
    pub backend: String,
    pub host: String,
    pub model: String,
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    /// Whole seconds, 0 waits forever.
    pub timeout_secs: u64,
    pub max_context_tokens: usize,
    pub parse_mode: ParseMode,
}

impl TurnConfig {
    pub fn new(backend: impl Into<String>, host: impl Into<String>, model: impl Into<String>) -> Self {
        TurnConfig {
            backend: backend.into(),
            host: host.into(),
            model: model.into(),
            api_key: None,
            system_prompt: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            parse_mode: ParseMode::default(),
        }
    }
}

impl fmt::Debug for TurnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("system_prompt", &self.system_prompt)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_context_tokens", &self.max_context_tokens)
            .field("parse_mode", &self.parse_mode)
            .finish()
    }
}

/// Application settings stored in courier.toml. Every field is optional so
/// that a partial file can be completed from the environment or the CLI.
#[derive(Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    pub backend: Option<String>,
    pub host: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_context_tokens: Option<usize>,
    pub parse_mode: Option<ParseMode>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("system_prompt", &self.system_prompt)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_context_tokens", &self.max_context_tokens)
            .field("parse_mode", &self.parse_mode)
            .finish()
    }
}

impl Settings {
    /// Load settings from the default settings file, or defaults if there is none.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = PathManager::settings_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override fields from `COURIER_*` environment variables.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::apply_env`] with a custom variable lookup.
    pub fn apply_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("COURIER_BACKEND") {
            self.backend = Some(v);
        }
        if let Some(v) = var("COURIER_HOST") {
            self.host = Some(v);
        }
        if let Some(v) = var("COURIER_MODEL") {
            self.model = Some(v);
        }
        if let Some(v) = var("COURIER_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = var("COURIER_SYSTEM_PROMPT") {
            self.system_prompt = Some(v);
        }
        if let Some(v) = var("COURIER_TIMEOUT_SECS") {
            self.timeout_secs = Some(parse_number("timeout_secs", &v)?);
        }
        if let Some(v) = var("COURIER_MAX_CONTEXT_TOKENS") {
            self.max_context_tokens = Some(parse_number("max_context_tokens", &v)?);
        }
        if let Some(v) = var("COURIER_PARSE_MODE") {
            self.parse_mode = Some(v.parse()?);
        }
        Ok(self)
    }

    /// Resolve into a [`TurnConfig`], failing on the first missing required field.
    pub fn turn_config(&self) -> Result<TurnConfig, ConfigError> {
        let required = |value: &Option<String>, name: &'static str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(ConfigError::Incomplete(name))
        };

        let mut turn = TurnConfig::new(
            required(&self.backend, "backend")?,
            required(&self.host, "host")?,
            required(&self.model, "model")?,
        );
        turn.api_key = self.api_key.clone().filter(|k| !k.trim().is_empty());
        turn.system_prompt = self.system_prompt.clone();
        if let Some(secs) = self.timeout_secs {
            turn.timeout_secs = secs;
        }
        if let Some(max) = self.max_context_tokens {
            turn.max_context_tokens = max;
        }
        if let Some(mode) = self.parse_mode {
            turn.parse_mode = mode;
        }
        Ok(turn)
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_settings_file() {
        let settings = Settings::from_toml_str(
            r#"
            backend = "ollama"
            host = "http://localhost:11434"
            model = "llama3"
            system_prompt = "You are helpful"
            parse_mode = "html"
            max_context_tokens = 4096
            "#,
        )
        .unwrap();

        let turn = settings.turn_config().unwrap();
        assert_eq!(turn.backend, "ollama");
        assert_eq!(turn.model, "llama3");
        assert_eq!(turn.system_prompt.as_deref(), Some("You are helpful"));
        assert_eq!(turn.parse_mode, ParseMode::Html);
        assert_eq!(turn.max_context_tokens, 4096);
        assert_eq!(turn.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(turn.api_key, None);
    }

    #[test]
    fn test_parse_mode_none() {
        let settings = Settings::from_toml_str(r#"parse_mode = "none""#).unwrap();
        assert_eq!(settings.parse_mode, Some(ParseMode::Plain));
        assert!(!ParseMode::Plain.is_formatted());
        assert_eq!("Markdown".parse::<ParseMode>().unwrap(), ParseMode::Markdown);
        assert!("bbcode".parse::<ParseMode>().is_err());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        assert!(matches!(
            Settings::from_toml_str("backend = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");
        fs::write(&path, "backend = \"openai\"\nmodel = \"gpt-4o\"\n").unwrap();
        let settings = Settings::from_path(&path).unwrap();
        assert_eq!(settings.backend.as_deref(), Some("openai"));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Settings::from_path(&missing),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let settings = Settings::from_toml_str("backend = \"openai\"\nmodel = \"gpt-4o\"")
            .unwrap()
            .apply_env_from(env(&[
                ("COURIER_BACKEND", "gemini"),
                ("COURIER_HOST", "https://generativelanguage.googleapis.com"),
                ("COURIER_API_KEY", "g-key"),
                ("COURIER_TIMEOUT_SECS", "0"),
                ("COURIER_PARSE_MODE", "none"),
                ("COURIER_MODEL", ""),
            ]))
            .unwrap();

        let turn = settings.turn_config().unwrap();
        assert_eq!(turn.backend, "gemini");
        assert_eq!(turn.model, "gpt-4o");
        assert_eq!(turn.api_key.as_deref(), Some("g-key"));
        assert_eq!(turn.timeout_secs, 0);
        assert_eq!(turn.parse_mode, ParseMode::Plain);
    }

    #[test]
    fn test_invalid_env_number() {
        let result = Settings::default().apply_env_from(env(&[("COURIER_MAX_CONTEXT_TOKENS", "lots")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "max_context_tokens", .. })
        ));
    }

    #[test]
    fn test_incomplete_settings() {
        let settings = Settings {
            backend: Some("ollama".to_string()),
            host: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            settings.turn_config(),
            Err(ConfigError::Incomplete("host"))
        ));
    }

    #[test]
    fn test_debug_masks_api_key() {
        let mut turn = TurnConfig::new("openai", "https://api.openai.com", "gpt-4o");
        turn.api_key = Some("sk-secret".to_string());
        let rendered = format!("{:?}", turn);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("***"));

        let settings = Settings {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", settings).contains("sk-secret"));
    }
}
