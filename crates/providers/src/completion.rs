//! Raw-completion backends: the prompt goes in as plain text, text comes out.
//!
//! Two wire dialects are supported:
//! - **Ollama** `POST {base}/api/generate` with
//!   `{model, prompt, stream: false, options: {num_predict, temperature, stop}}`,
//!   reply in `response`.
//! - **Hugging Face Inference** `POST {base}/{model}` with
//!   `{inputs, parameters: {max_new_tokens, temperature, return_full_text: false, stop}}`,
//!   reply in `[0].generated_text`.

use async_trait::async_trait;
use pitwall_config::{Credentials, ProviderKind, RemoteEndpoint};
use pitwall_core::error::ProviderError;
use pitwall_core::provider::*;
use std::time::Duration;
use tracing::debug;

use crate::http;

/// Which completion wire format an endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionDialect {
    Ollama,
    HfInference,
}

pub struct CompletionProvider {
    name: String,
    base_url: String,
    dialect: CompletionDialect,
    credentials: Credentials,
    client: reqwest::Client,
}

impl CompletionProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        dialect: CompletionDialect,
        credentials: Credentials,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dialect,
            credentials,
            client: http::client(timeout),
        }
    }

    /// Build from a resolved endpoint. Returns `None` for chat endpoints.
    pub fn from_endpoint(endpoint: &RemoteEndpoint, timeout: Duration) -> Option<Self> {
        let dialect = match endpoint.kind {
            ProviderKind::Ollama => CompletionDialect::Ollama,
            ProviderKind::HfInference => CompletionDialect::HfInference,
            ProviderKind::Chat => return None,
        };
        Some(Self::new(
            &endpoint.name,
            &endpoint.base_url,
            dialect,
            endpoint.credentials.clone(),
            timeout,
        ))
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>, timeout: Duration) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434"),
            CompletionDialect::Ollama,
            Credentials::None,
            timeout,
        )
    }

    pub fn dialect(&self) -> CompletionDialect {
        self.dialect
    }

    fn url(&self, model: &str) -> String {
        match self.dialect {
            CompletionDialect::Ollama => format!("{}/api/generate", self.base_url),
            CompletionDialect::HfInference => format!("{}/{}", self.base_url, model),
        }
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        match self.dialect {
            CompletionDialect::Ollama => serde_json::json!({
                "model": request.model,
                "prompt": request.prompt,
                "stream": false,
                "options": {
                    "num_predict": request.max_tokens,
                    "temperature": request.temperature,
                    "stop": request.stop,
                },
            }),
            CompletionDialect::HfInference => serde_json::json!({
                "inputs": request.prompt,
                "parameters": {
                    "max_new_tokens": request.max_tokens,
                    "temperature": request.temperature,
                    "return_full_text": false,
                    "stop": request.stop,
                },
            }),
        }
    }

    /// Pull the generated text out of a response body.
    fn extract_text(&self, body: &serde_json::Value) -> Result<String, ProviderError> {
        let text = match self.dialect {
            CompletionDialect::Ollama => body["response"].as_str(),
            // The Inference API answers with a one-element list, some
            // deployments with a bare object.
            CompletionDialect::HfInference => body[0]["generated_text"]
                .as_str()
                .or_else(|| body["generated_text"].as_str()),
        };

        match text {
            Some(t) => Ok(t.trim().to_string()),
            None => {
                let detail = body["error"]
                    .as_str()
                    .map(String::from)
                    .unwrap_or_else(|| "missing generated text".to_string());
                Err(ProviderError::InvalidResponse(detail))
            }
        }
    }

    fn usage(&self, body: &serde_json::Value) -> Option<Usage> {
        if self.dialect != CompletionDialect::Ollama {
            return None;
        }
        let prompt_tokens = u32::try_from(body["prompt_eval_count"].as_u64()?).ok()?;
        let completion_tokens = u32::try_from(body["eval_count"].as_u64()?).ok()?;
        Some(Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        })
    }
}

#[async_trait]
impl Provider for CompletionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: GenerationRequest) -> Result<Completion, ProviderError> {
        let url = self.url(&request.model);
        let body = self.request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            dialect = ?self.dialect,
            "Sending completion request"
        );

        let response = http::authorize(self.client.post(&url), &self.credentials)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::transport_error(&self.name, e))?;

        let response = http::check_status(&self.name, response).await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| http::transport_error(&self.name, e))?;

        let text = self.extract_text(&body)?;
        let model = body["model"]
            .as_str()
            .map(String::from)
            .unwrap_or(request.model);

        Ok(Completion {
            text,
            model,
            usage: self.usage(&body),
        })
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        match self.dialect {
            CompletionDialect::Ollama => {
                let url = format!("{}/api/tags", self.base_url);
                let response = http::authorize(self.client.get(&url), &self.credentials)
                    .send()
                    .await
                    .map_err(|e| http::transport_error(&self.name, e))?;
                Ok(response.status().is_success())
            }
            // The Inference API has no cheap liveness endpoint.
            CompletionDialect::HfInference => Ok(true),
        }
    }
}
