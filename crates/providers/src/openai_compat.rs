//! OpenAI-compatible chat backend.
//!
//! Works with: OpenAI, Groq, OpenRouter, DeepSeek, Together AI, vLLM,
//! llama.cpp server, and any endpoint exposing `/chat/completions`.
//!
//! The whole prompt is sent as a single user message; the reply is read from
//! `choices[0].message.content`.

use async_trait::async_trait;
use pitwall_config::{Credentials, RemoteEndpoint};
use pitwall_core::error::ProviderError;
use pitwall_core::provider::*;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::http;

/// An OpenAI-compatible chat provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    credentials: Credentials,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            client: http::client(timeout),
        }
    }

    /// Build from a resolved endpoint.
    pub fn from_endpoint(endpoint: &RemoteEndpoint, timeout: Duration) -> Self {
        Self::new(
            &endpoint.name,
            &endpoint.base_url,
            endpoint.credentials.clone(),
            timeout,
        )
    }

    /// Create a Groq provider (convenience constructor).
    pub fn groq(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::new(
            "groq",
            "https://api.groq.com/openai/v1",
            Credentials::Bearer(api_key.into()),
            timeout,
        )
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::new(
            "openai",
            "https://api.openai.com/v1",
            Credentials::Bearer(api_key.into()),
            timeout,
        )
    }

    fn request_body(request: &GenerationRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": false,
        });

        if !request.stop.is_empty() {
            // OpenAI accepts at most four stop sequences.
            let stop: Vec<&String> = request.stop.iter().take(4).collect();
            body["stop"] = serde_json::json!(stop);
        }

        body
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: GenerationRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = http::authorize(self.client.post(&url), &self.credentials)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::transport_error(&self.name, e))?;

        let response = http::check_status(&self.name, response).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| http::transport_error(&self.name, e))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let text = choice
            .message
            .content
            .ok_or_else(|| ProviderError::InvalidResponse("Choice has no content".into()))?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(Completion {
            text: text.trim().to_string(),
            model: api_response.model.unwrap_or(request.model),
            usage,
        })
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = http::authorize(self.client.get(&url), &self.credentials)
            .send()
            .await
            .map_err(|e| http::transport_error(&self.name, e))?;

        Ok(response.status().is_success())
    }
}

// ── API response types (private) ───────────────────────────────────────

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
