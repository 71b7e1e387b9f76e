//! Local inference backend: runs a GGUF-quantized model in-process.
//!
//! Uses [Candle](https://github.com/huggingface/candle) (Rust-native ML) with
//! the quantized Llama architecture, which also covers Mistral models such as
//! `mistral-7b-instruct-v0.1.Q2_K.gguf`.
//!
//! The model is a single instance behind a mutex: one generation runs at a
//! time, on a blocking thread. CPU parallelism inside a forward pass runs on
//! the global rayon pool, sized from `local.threads` when the model loads.

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama as qlm;
use hf_hub::api::sync::Api;
use pitwall_config::LocalModelConfig;
use pitwall_core::error::ProviderError;
use pitwall_core::provider::{Completion, GenerationRequest, Usage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tokenizers::Tokenizer;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::router::find_stop;

/// Where to fetch `tokenizer.json` when none is configured or found next to
/// the model file.
const FALLBACK_TOKENIZER_REPO: &str = "mistralai/Mistral-7B-Instruct-v0.1";

static THREAD_POOL: Once = Once::new();

/// Size the global rayon pool once per process. A pool that already exists
/// (an embedding application built its own) is left alone.
fn configure_threads(threads: usize) {
    THREAD_POOL.call_once(|| {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build_global()
        {
            Ok(()) => debug!(threads, "Inference thread pool configured"),
            Err(e) => warn!(error = %e, "Inference thread pool already initialized, keeping it"),
        }
    });
}

/// A provider that runs a GGUF model locally via Candle.
///
/// The model is loaded on first use (or by [`LocalProvider::load`] /
/// `health_check`) and kept for the life of the process.
pub struct LocalProvider {
    inner: Arc<Mutex<Option<LocalModelState>>>,
    config: LocalModelConfig,
}

/// The loaded model state (tokenizer + weights).
struct LocalModelState {
    model: qlm::ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: u32,
    context_size: usize,
    batch_size: usize,
}

impl LocalProvider {
    /// Create a provider that loads `config.model_path` lazily.
    pub fn new(config: LocalModelConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Eagerly load the model. Blocking: call it from a blocking context.
    pub fn load(config: LocalModelConfig) -> Result<Self, ProviderError> {
        let state = LocalModelState::load(&config)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(state))),
            config,
        })
    }

    /// Run `f` on the loaded model in a blocking thread, loading it first if
    /// needed.
    async fn with_model<T, F>(&self, f: F) -> Result<T, ProviderError>
    where
        T: Send + 'static,
        F: FnOnce(&mut LocalModelState) -> Result<T, ProviderError> + Send + 'static,
    {
        let inner = self.inner.clone();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = inner.blocking_lock();
            if guard.is_none() {
                *guard = Some(LocalModelState::load(&config)?);
            }
            match guard.as_mut() {
                Some(state) => f(state),
                None => Err(ProviderError::NotConfigured("local model is not loaded".into())),
            }
        })
        .await
        .map_err(|e| ProviderError::Inference(format!("Inference task failed: {e}")))?
    }
}

impl LocalModelState {
    fn load(config: &LocalModelConfig) -> Result<Self, ProviderError> {
        configure_threads(config.threads);
        let device = Device::Cpu;
        let path = config.model_path.as_path();

        info!(
            path = %path.display(),
            threads = config.threads,
            context_size = config.context_size,
            batch_size = config.batch_size,
            "Loading local GGUF model"
        );

        let mut file = std::fs::File::open(path).map_err(|e| {
            ProviderError::NotConfigured(format!(
                "Failed to open model file {}: {e}",
                path.display()
            ))
        })?;

        let gguf = gguf_file::Content::read(&mut file)
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to parse GGUF file: {e}")))?;

        let model = qlm::ModelWeights::from_gguf(gguf, &mut file, &device).map_err(|e| {
            ProviderError::NotConfigured(format!("Failed to load model weights: {e}"))
        })?;

        let tokenizer_path = resolve_tokenizer(config.tokenizer_path.as_deref(), path)?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to load tokenizer: {e}")))?;

        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .or_else(|| tokenizer.token_to_id("<|eot_id|>"))
            .unwrap_or(2);

        info!(eos_token_id, "Local model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            eos_token_id,
            context_size: config.context_size,
            batch_size: config.batch_size,
        })
    }

    /// Feed `tokens` starting at position `index_pos`, returning the logits
    /// for the last one.
    fn forward(&mut self, tokens: &[u32], index_pos: usize) -> Result<Tensor, ProviderError> {
        let input = Tensor::new(tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;
        self.model
            .forward(&input, index_pos)
            .and_then(|logits| logits.squeeze(0))
            .map_err(map_candle_err)
    }

    /// Run inference: tokenize, prefill, sample until EOS, a stop sequence or
    /// the token budget.
    fn generate(
        &mut self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
        stop: &[String],
    ) -> Result<(String, u32, u32), ProviderError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ProviderError::Inference(format!("Tokenization failed: {e}")))?;

        let budget = self
            .context_size
            .saturating_sub(max_tokens as usize)
            .max(1);
        let tokens = keep_last(encoding.get_ids(), budget);
        if tokens.is_empty() {
            return Err(ProviderError::Inference("prompt produced no tokens".into()));
        }
        if tokens.len() < encoding.get_ids().len() {
            warn!(
                dropped = encoding.get_ids().len() - tokens.len(),
                "Prompt exceeds local context, dropping oldest tokens"
            );
        }
        let prompt_token_count = u32::try_from(tokens.len()).unwrap_or(u32::MAX);

        debug!(
            prompt_tokens = prompt_token_count,
            max_tokens,
            temperature,
            "Starting local generation"
        );

        // The first batch goes in one pass; the attention mask of the
        // quantized model only covers a fresh cache, so later prompt tokens
        // are fed one at a time.
        let first = tokens.len().min(self.batch_size.max(1));
        let mut logits = self.forward(&tokens[..first], 0)?;
        let mut pos = first;
        for &token in &tokens[first..] {
            logits = self.forward(&[token], pos)?;
            pos += 1;
        }

        let mut logits_processor = if temperature <= 0.0 {
            LogitsProcessor::new(42, None, None)
        } else {
            LogitsProcessor::new(42, Some(temperature as f64), None)
        };

        let mut generated: Vec<u32> = Vec::new();
        for _ in 0..max_tokens {
            let next = logits_processor.sample(&logits).map_err(map_candle_err)?;
            if next == self.eos_token_id {
                break;
            }
            generated.push(next);

            if !stop.is_empty() && find_stop(&self.decode(&generated)?, stop).is_some() {
                break;
            }
            if pos + 1 >= self.context_size {
                break;
            }

            logits = self.forward(&[next], pos)?;
            pos += 1;
        }

        let output = self.decode(&generated)?;
        debug!(
            completion_tokens = generated.len(),
            output_len = output.len(),
            "Generation complete"
        );

        let completion_token_count = u32::try_from(generated.len()).unwrap_or(u32::MAX);
        Ok((output, prompt_token_count, completion_token_count))
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, ProviderError> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(|e| ProviderError::Inference(format!("Detokenization failed: {e}")))
    }
}

/// The trailing `budget` tokens of `ids`.
fn keep_last(ids: &[u32], budget: usize) -> &[u32] {
    &ids[ids.len().saturating_sub(budget)..]
}

/// Configured tokenizer, else `tokenizer.json` beside the model, else a
/// download from the Hugging Face Hub.
fn resolve_tokenizer(configured: Option<&Path>, model_path: &Path) -> Result<PathBuf, ProviderError> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }

    let beside = model_path.with_file_name("tokenizer.json");
    if beside.exists() {
        return Ok(beside);
    }

    warn!(
        repo = FALLBACK_TOKENIZER_REPO,
        "No tokenizer.json next to the model, downloading one"
    );
    let api = Api::new()
        .map_err(|e| ProviderError::Network(format!("HuggingFace Hub API error: {e}")))?;
    api.model(FALLBACK_TOKENIZER_REPO.to_string())
        .get("tokenizer.json")
        .map_err(|e| ProviderError::Network(format!("Failed to download tokenizer: {e}")))
}

/// Map Candle errors to ProviderError.
fn map_candle_err(e: candle_core::Error) -> ProviderError {
    ProviderError::Inference(format!("Candle inference error: {e}"))
}

#[async_trait]
impl pitwall_core::provider::Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<Completion, ProviderError> {
        let GenerationRequest {
            model,
            prompt,
            max_tokens,
            temperature,
            stop,
        } = request;

        let (output, prompt_tokens, completion_tokens) = self
            .with_model(move |state| state.generate(&prompt, max_tokens, temperature, &stop))
            .await?;

        Ok(Completion {
            text: output.trim().trim_end_matches("</s>").trim().to_string(),
            model: format!("local/{model}"),
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens.saturating_add(completion_tokens),
            }),
        })
    }

    /// Loads the model if it is not loaded yet.
    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.with_model(|_| Ok(true)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_core::provider::Provider;

    #[test]
    fn keep_last_drops_oldest_tokens() {
        assert_eq!(keep_last(&[1, 2, 3, 4, 5], 3), &[3, 4, 5]);
        assert_eq!(keep_last(&[1, 2], 8), &[1, 2]);
    }

    #[test]
    fn configured_tokenizer_wins() {
        let path = resolve_tokenizer(
            Some(Path::new("/models/tok.json")),
            Path::new("/models/m.gguf"),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/models/tok.json"));
    }

    #[test]
    fn tokenizer_beside_model_is_used() {
        let dir = std::env::temp_dir().join("pitwall-tokenizer-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tokenizer.json"), "{}").unwrap();
        let path = resolve_tokenizer(None, &dir.join("model.gguf")).unwrap();
        assert_eq!(path, dir.join("tokenizer.json"));
    }

    #[test]
    fn thread_pool_is_configured_once() {
        configure_threads(2);
        configure_threads(8);
        assert!(THREAD_POOL.is_completed());
        assert!(rayon::current_num_threads() >= 1);
    }

    #[tokio::test]
    async fn missing_model_file_is_a_configuration_error() {
        let provider = LocalProvider::new(LocalModelConfig {
            model_path: PathBuf::from("/nonexistent/model.gguf"),
            ..LocalModelConfig::default()
        });
        let err = provider.health_check().await.unwrap_err();
        assert!(err.is_configuration());
    }
}
