//! Answer synthesis through external LLM APIs (OpenAI/Anthropic/Groq).
//!
//! Generation is a single non-streaming request bounded by a client
//! timeout. No API key means no generator: callers get an unavailable
//! `TextGenerator` and fall back to their own heuristics.

pub mod config;
pub mod generator;
pub mod prompts;
pub mod providers;
pub mod types;

pub use config::LLMConfig;
pub use generator::{create_generator, GenerateFuture, LlmGenerator, TextGenerator, UnavailableGenerator};
pub use types::*;
