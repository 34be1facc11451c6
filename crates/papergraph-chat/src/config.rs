//! LLM configuration and provider selection.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{LLMProvider, ResolvedProvider};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_MAX_TOKENS: usize = 2048;

/// Stored LLM configuration (`llm-config.json`), merged with env vars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// `auto`, `openai`, `anthropic` or `groq`.
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}
fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            groq_model: default_groq_model(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Treat blank strings as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// `load` with an explicit environment lookup.
    pub fn load_with(config_path: &Path, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut config: LLMConfig = match std::fs::read_to_string(config_path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", config_path.display(), e);
                LLMConfig::default()
            }),
            Err(_) => LLMConfig::default(),
        };

        // Env vars fill keys the file leaves unset.
        if non_empty(config.openai_api_key.clone()).is_none() {
            config.openai_api_key = non_empty(env("OPENAI_API_KEY"));
        }
        if non_empty(config.anthropic_api_key.clone()).is_none() {
            config.anthropic_api_key = non_empty(env("ANTHROPIC_API_KEY"));
        }
        if non_empty(config.groq_api_key.clone()).is_none() {
            config.groq_api_key = non_empty(env("GROQ_API_KEY"));
        }
        if let Some(model) = non_empty(env("GROQ_MODEL")) {
            config.groq_model = model;
        }

        debug!(
            "LLM config: preferred={}, openai={}, anthropic={}, groq={}",
            config.preferred_provider,
            config.openai_api_key.is_some(),
            config.anthropic_api_key.is_some(),
            config.groq_api_key.is_some()
        );
        config
    }

    /// Resolve which provider and model to use.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        let pick = |provider: LLMProvider, model: &str, key: &Option<String>| {
            non_empty(key.clone()).map(|api_key| ResolvedProvider {
                provider,
                model: model.to_string(),
                api_key,
            })
        };

        match self.preferred_provider.as_str() {
            "openai" => pick(LLMProvider::OpenAI, &self.openai_model, &self.openai_api_key),
            "anthropic" => pick(
                LLMProvider::Anthropic,
                &self.anthropic_model,
                &self.anthropic_api_key,
            ),
            "groq" => pick(LLMProvider::Groq, &self.groq_model, &self.groq_api_key),
            // Auto mode: Anthropic > Groq > OpenAI
            "auto" => pick(
                LLMProvider::Anthropic,
                &self.anthropic_model,
                &self.anthropic_api_key,
            )
            .or_else(|| pick(LLMProvider::Groq, &self.groq_model, &self.groq_api_key))
            .or_else(|| pick(LLMProvider::OpenAI, &self.openai_model, &self.openai_api_key)),
            other => {
                warn!("Unknown preferred provider '{}'", other);
                None
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.resolve_provider().is_some()
    }
}
