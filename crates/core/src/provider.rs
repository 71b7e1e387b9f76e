//! Provider trait: the abstraction over text-generation backends.
//!
//! A Provider knows how to turn one prompt into one completion. The dialogue
//! engine never talks to a backend directly; it goes through the model router,
//! which holds exactly one `Provider` chosen by configuration.
//!
//! Implementations: local GGUF model, OpenAI-style chat endpoints,
//! Ollama-style and Hugging Face-style completion endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use (e.g., "llama-3.1-8b-instant", "mistral")
    pub model: String,

    /// The fully assembled prompt text
    pub prompt: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.4
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens: 80,
            temperature: default_temperature(),
            stop: Vec::new(),
        }
    }
}

/// The raw text a backend produced for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text, untouched apart from outer whitespace
    pub text: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Every backend (local model, remote chat, remote completion) implements
/// this trait. The router calls `complete()` without knowing which backend
/// is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "groq", "ollama", "local").
    fn name(&self) -> &str;

    /// Generate a completion for the request.
    async fn complete(&self, request: GenerationRequest) -> Result<Completion, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
