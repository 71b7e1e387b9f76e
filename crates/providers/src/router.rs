//! Model router: invokes the one configured backend per call.
//!
//! The router owns the provider chosen at startup, the model id, the stop list
//! and the hard timeout. There is no cross-provider fallback chain; a failed
//! call is reported to the caller, which decides what the player sees.

use pitwall_config::{AppConfig, ConfigError, ResolvedBackend};
use pitwall_core::error::ProviderError;
use pitwall_core::provider::{GenerationRequest, Provider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::completion::CompletionProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Text produced by one router call, with the wall-clock time it took.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub latency: Duration,
}

/// Routes generation requests to the configured provider.
pub struct ModelRouter {
    provider: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
    stop: Vec<String>,
}

impl ModelRouter {
    /// Create a router over `provider`, stopping on the default stop list
    /// for an NPC called `npc_name`.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        npc_name: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout,
            stop: default_stops(npc_name),
        }
    }

    /// Replace the stop list.
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stop(&self) -> &[String] {
        &self.stop
    }

    /// Generate a reply for `prompt`.
    ///
    /// Returns within the configured timeout or fails with
    /// [`ProviderError::Timeout`]. The text is cut at the first stop sequence
    /// that follows non-blank output, for backends that ignore `stop`.
    pub async fn invoke(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Generation, ProviderError> {
        let request = GenerationRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            max_tokens,
            temperature,
            stop: self.stop.clone(),
        };

        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            prompt_chars = prompt.len(),
            max_tokens,
            "Invoking model"
        );

        let started = Instant::now();
        let completion = match tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    provider = %self.provider.name(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Model call timed out"
                );
                return Err(ProviderError::Timeout(format!(
                    "{} did not answer within {:?}",
                    self.provider.name(),
                    self.timeout
                )));
            }
        };
        let latency = started.elapsed();

        let text = truncate_at_stop(&completion.text, &self.stop).to_string();

        debug!(
            provider = %self.provider.name(),
            model = %completion.model,
            latency_ms = latency.as_millis() as u64,
            chars = text.len(),
            "Model answered"
        );

        Ok(Generation { text, latency })
    }

    /// Check that the backend is reachable (for the local backend: loaded).
    pub async fn health_check(&self) -> Result<bool, ProviderError> {
        self.provider.health_check().await
    }
}

/// The default stop list for an NPC named `npc_name`.
pub fn default_stops(npc_name: &str) -> Vec<String> {
    vec![
        "Player:".into(),
        "Human:".into(),
        format!("{npc_name}:"),
        "\n\n".into(),
    ]
}

/// Length of the leading run of stop sequences and whitespace, e.g. the
/// `"Dax: Dax: "` in `"Dax: Dax: Hello"`.
fn leading_stop_run(text: &str, stops: &[String]) -> usize {
    let mut pos = 0;
    loop {
        let rest = &text[pos..];
        let trimmed = rest.trim_start();
        let skipped = rest.len() - trimmed.len();
        match stops
            .iter()
            .filter(|s| !s.is_empty())
            .find(|s| trimmed.starts_with(s.as_str()))
        {
            Some(stop) => pos += skipped + stop.len(),
            None => return pos,
        }
    }
}

/// Byte offset of the earliest stop sequence that follows non-blank text,
/// ignoring the leading run of role prefixes.
pub fn find_stop(text: &str, stops: &[String]) -> Option<usize> {
    let start = leading_stop_run(text, stops);
    stops
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|stop| {
            text.match_indices(stop.as_str())
                .map(|(idx, _)| idx)
                .find(|&idx| idx >= start && !text[start..idx].trim().is_empty())
        })
        .min()
}

/// Cut `text` at the first stop sequence that follows non-blank output.
///
/// Stop sequences at the very start (e.g. a repeated `Dax:` role prefix) are
/// left for the sanitizer.
pub fn truncate_at_stop<'a>(text: &'a str, stops: &[String]) -> &'a str {
    match find_stop(text, stops) {
        Some(idx) => text[..idx].trim_end(),
        None => text.trim_end(),
    }
}

/// Build the router from configuration.
///
/// Fails with a [`ConfigError`] when the backend cannot be constructed:
/// missing credentials or endpoint, or the local backend in a build without
/// the `local` feature.
pub fn build_from_config(config: &AppConfig) -> Result<ModelRouter, ConfigError> {
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let npc_name = &config.dialogue.npc_name;

    match config.resolve_backend()? {
        ResolvedBackend::Remote(endpoint) => {
            info!(
                provider = %endpoint.name,
                kind = ?endpoint.kind,
                model = %endpoint.model,
                "Using remote backend"
            );
            let provider: Arc<dyn Provider> =
                match CompletionProvider::from_endpoint(&endpoint, timeout) {
                    Some(p) => Arc::new(p),
                    None => Arc::new(OpenAiCompatProvider::from_endpoint(&endpoint, timeout)),
                };
            Ok(ModelRouter::new(provider, endpoint.model, npc_name, timeout))
        }
        ResolvedBackend::Local(local) => build_local(local, npc_name, timeout),
    }
}

#[cfg(feature = "local")]
fn build_local(
    local: pitwall_config::LocalModelConfig,
    npc_name: &str,
    timeout: Duration,
) -> Result<ModelRouter, ConfigError> {
    if !local.model_path.exists() {
        return Err(ConfigError::BackendUnavailable(format!(
            "local model file not found at {}",
            local.model_path.display()
        )));
    }
    info!(path = %local.model_path.display(), "Using local backend");
    let model = local
        .model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "local".to_string());
    let provider = Arc::new(crate::local::LocalProvider::new(local));
    Ok(ModelRouter::new(provider, model, npc_name, timeout))
}

#[cfg(not(feature = "local"))]
fn build_local(
    _local: pitwall_config::LocalModelConfig,
    _npc_name: &str,
    _timeout: Duration,
) -> Result<ModelRouter, ConfigError> {
    Err(ConfigError::BackendUnavailable(
        "this build has no local backend; rebuild with `--features local` or set llm.backend = \"remote\"".into(),
    ))
}
