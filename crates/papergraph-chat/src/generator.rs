//! Text-generation capability used for answer synthesis.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use papergraph_core::{Error, Result};
use reqwest::Client;
use tracing::{info, warn};

use crate::config::LLMConfig;
use crate::providers::{self, CompletionParams};
use crate::types::{ChatMessage, LLMProvider, ResolvedProvider};

/// Boxed future returned by `TextGenerator::generate`.
pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// `generate(system_prompt, user_prompt) -> text`, fallible and time-bounded.
pub trait TextGenerator: Send + Sync {
    /// False when no provider is configured; `generate` then always fails.
    fn is_available(&self) -> bool;

    /// Human-readable `provider/model` label.
    fn describe(&self) -> String;

    fn generate<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> GenerateFuture<'a>;
}

/// Generator backed by an external provider API.
pub struct LlmGenerator {
    client: Client,
    provider: LLMProvider,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f64,
    max_tokens: usize,
}

impl LlmGenerator {
    pub fn new(
        resolved: ResolvedProvider,
        temperature: f64,
        max_tokens: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: providers::default_endpoint(resolved.provider).to_string(),
            provider: resolved.provider,
            model: resolved.model,
            api_key: resolved.api_key,
            temperature,
            max_tokens,
        })
    }

    /// Send requests to `endpoint` instead of the provider's public URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl TextGenerator for LlmGenerator {
    fn is_available(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }

    fn generate<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            let messages = [ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)];
            let params = CompletionParams {
                provider: self.provider,
                endpoint: &self.endpoint,
                model: &self.model,
                api_key: &self.api_key,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };
            providers::complete(&self.client, params, &messages).await
        })
    }
}

/// Stand-in when no provider is configured.
pub struct UnavailableGenerator;

impl TextGenerator for UnavailableGenerator {
    fn is_available(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        "none".into()
    }

    fn generate<'a>(&'a self, _system_prompt: &'a str, _user_prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async { Err(Error::Config("no LLM provider configured".into())) })
    }
}

/// Build the generator for `config`, or an unavailable one when no
/// provider resolves.
pub fn create_generator(config: &LLMConfig, timeout: Duration) -> Arc<dyn TextGenerator> {
    let Some(resolved) = config.resolve_provider() else {
        info!("No LLM provider configured, answer synthesis disabled");
        return Arc::new(UnavailableGenerator);
    };

    match LlmGenerator::new(resolved, config.temperature, config.max_tokens, timeout) {
        Ok(generator) => {
            info!(
                "Answer synthesis via {} (timeout {}s)",
                generator.describe(),
                timeout.as_secs()
            );
            Arc::new(generator)
        }
        Err(e) => {
            warn!("LLM generator unavailable: {}", e);
            Arc::new(UnavailableGenerator)
        }
    }
}
