//! External LLM provider calls (non-streaming).
//!
//! OpenAI and Groq share the chat-completions format. Anthropic uses the
//! Messages API with the system prompt as a top-level field.

use papergraph_core::{Error, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::types::{ChatMessage, LLMProvider};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Public completion endpoint of `provider`.
pub fn default_endpoint(provider: LLMProvider) -> &'static str {
    match provider {
        LLMProvider::OpenAI => OPENAI_URL,
        LLMProvider::Groq => GROQ_URL,
        LLMProvider::Anthropic => ANTHROPIC_URL,
    }
}

/// Everything but the messages for one completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionParams<'a> {
    pub provider: LLMProvider,
    pub endpoint: &'a str,
    pub model: &'a str,
    pub api_key: &'a str,
    pub temperature: f64,
    pub max_tokens: usize,
}

/// Request one completion from the provider.
pub async fn complete(
    client: &Client,
    params: CompletionParams<'_>,
    messages: &[ChatMessage],
) -> Result<String> {
    match params.provider {
        LLMProvider::OpenAI | LLMProvider::Groq => {
            complete_openai_compat(client, params, messages).await
        }
        LLMProvider::Anthropic => complete_anthropic(client, params, messages).await,
    }
}

async fn complete_openai_compat(
    client: &Client,
    params: CompletionParams<'_>,
    messages: &[ChatMessage],
) -> Result<String> {
    let msgs: Vec<Value> = messages
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();
    let body = json!({
        "model": params.model,
        "messages": msgs,
        "temperature": params.temperature,
        "max_tokens": params.max_tokens,
        "stream": false,
    });

    debug!("Requesting completion from {} with model {}", params.endpoint, params.model);
    let response = client
        .post(params.endpoint)
        .header("Authorization", format!("Bearer {}", params.api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(request_error)?;

    let parsed = read_json(response).await?;
    openai_content(&parsed)
}

async fn complete_anthropic(
    client: &Client,
    params: CompletionParams<'_>,
    messages: &[ChatMessage],
) -> Result<String> {
    let system_msg: Option<&str> = messages
        .iter()
        .find(|m| m.role == "system")
        .map(|m| m.content.as_str());
    let conv_msgs: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();

    let mut body = json!({
        "model": params.model,
        "messages": conv_msgs,
        "temperature": params.temperature,
        "max_tokens": params.max_tokens,
    });
    if let Some(sys) = system_msg {
        body["system"] = json!(sys);
    }

    debug!("Requesting completion from {} with model {}", params.endpoint, params.model);
    let response = client
        .post(params.endpoint)
        .header("x-api-key", params.api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(request_error)?;

    let parsed = read_json(response).await?;
    anthropic_content(&parsed)
}

fn request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Http(format!("request timed out: {}", e))
    } else {
        Error::Http(format!("request failed: {}", e))
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Http(format!("API error {}: {}", status, body)));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| Error::Http(format!("invalid response body: {}", e)))
}

/// Text of the first choice in a chat-completions response.
pub fn openai_content(body: &Value) -> Result<String> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .trim();
    if content.is_empty() {
        return Err(Error::Synthesis("empty LLM response".into()));
    }
    Ok(content.to_string())
}

/// Concatenated text blocks of a Messages API response.
pub fn anthropic_content(body: &Value) -> Result<String> {
    if body["type"].as_str() == Some("error") {
        let msg = body["error"]["message"].as_str().unwrap_or("Unknown error");
        return Err(Error::Synthesis(msg.to_string()));
    }
    let text: String = body["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"].as_str() == Some("text"))
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Synthesis("empty LLM response".into()));
    }
    Ok(text.to_string())
}
