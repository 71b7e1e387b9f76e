//! Configuration loading, validation, and backend resolution for Pitwall.
//!
//! Loads configuration from `~/.pitwall/config.toml`, applies environment
//! variable overrides, and validates all settings at startup. Configuration is
//! read once per process; the dialogue engine never re-reads it per call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.pitwall/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend selection and generation settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Per-provider overrides, keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// In-process model settings (used when `llm.backend = "local"`)
    #[serde(default)]
    pub local: LocalModelConfig,

    /// Conversation handling
    #[serde(default)]
    pub dialogue: DialogueConfig,

    /// Sentiment tagging
    #[serde(default)]
    pub sentiment: SentimentConfig,
}

/// Which kind of backend serves generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process GGUF model
    Local,
    /// Remote HTTP provider
    Remote,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Remote provider name (e.g. "groq", "openai", "ollama", "huggingface")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Default model id for the remote provider
    #[serde(default = "default_model")]
    pub model: String,

    /// API key shared by all providers (can be overridden per provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum output tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Hard timeout for one generation call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend() -> BackendKind {
    BackendKind::Local
}
fn default_provider() -> String {
    "groq".into()
}
fn default_model() -> String {
    "llama-3.1-8b-instant".into()
}
fn default_max_tokens() -> u32 {
    80
}
fn default_temperature() -> f32 {
    0.4
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("backend", &self.backend)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Wire shape a remote provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-style `/chat/completions`
    Chat,
    /// Ollama-style `/api/generate`
    Ollama,
    /// Hugging Face Inference API text generation
    HfInference,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProviderKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Basic-auth user, for self-hosted gateways
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    /// Path to a GGUF model file
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Path to `tokenizer.json`; defaults to the file next to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,

    /// CPU threads used for inference
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Context window in tokens (prompt + reply)
    #[serde(default = "default_context_size")]
    pub context_size: usize,

    /// Maximum prompt tokens evaluated in one forward pass
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("./models/mistral-7b-instruct-v0.1.Q2_K.gguf")
}
fn default_threads() -> usize {
    2
}
fn default_context_size() -> usize {
    4096
}
fn default_batch_size() -> usize {
    128
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            tokenizer_path: None,
            threads: default_threads(),
            context_size: default_context_size(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// The NPC's name, used in the prompt and as a stop sequence
    #[serde(default = "default_npc_name")]
    pub npc_name: String,

    /// Turns of history sent to the model
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Turns the caller should fetch from storage
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Estimated-token cap on the history block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_token_budget: Option<usize>,
}

fn default_npc_name() -> String {
    "Dax".into()
}
fn default_context_window() -> usize {
    15
}
fn default_history_limit() -> usize {
    20
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            npc_name: default_npc_name(),
            context_window: default_context_window(),
            history_limit: default_history_limit(),
            context_token_budget: Some(1500),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    /// Memoized readings kept in memory (0 disables the cache)
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_cache_size() -> usize {
    1000
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            cache_size: default_cache_size(),
        }
    }
}

// ── Backend resolution ─────────────────────────────────────────────────

/// How to authenticate against a remote provider.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    None,
    Bearer(String),
    Basic {
        username: String,
        password: Option<String>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::None => f.write_str("None"),
            Credentials::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// A fully resolved remote endpoint.
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub credentials: Credentials,
}

/// The single backend this process will use.
#[derive(Debug, Clone)]
pub enum ResolvedBackend {
    Local(LocalModelConfig),
    Remote(RemoteEndpoint),
}

/// Built-in knowledge about well-known providers.
struct KnownProvider {
    kind: ProviderKind,
    base_url: &'static str,
    needs_credentials: bool,
}

fn known_provider(name: &str) -> Option<KnownProvider> {
    let (kind, base_url, needs_credentials) = match name {
        "groq" => (ProviderKind::Chat, "https://api.groq.com/openai/v1", true),
        "openai" => (ProviderKind::Chat, "https://api.openai.com/v1", true),
        "openrouter" => (ProviderKind::Chat, "https://openrouter.ai/api/v1", true),
        "deepseek" => (ProviderKind::Chat, "https://api.deepseek.com/v1", true),
        "together" => (ProviderKind::Chat, "https://api.together.xyz/v1", true),
        "huggingface" | "hf" => (
            ProviderKind::HfInference,
            "https://api-inference.huggingface.co/models",
            true,
        ),
        "ollama" => (ProviderKind::Ollama, "http://localhost:11434", false),
        "llamacpp" | "llama.cpp" => (ProviderKind::Chat, "http://localhost:8080/v1", false),
        "vllm" => (ProviderKind::Chat, "http://localhost:8000/v1", false),
        _ => return None,
    };
    Some(KnownProvider {
        kind,
        base_url,
        needs_credentials,
    })
}

impl AppConfig {
    /// Load configuration from the default path (~/.pitwall/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load a specific file, then apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` as the environment.
    ///
    /// Recognizes the `PITWALL_*` variables plus the historical deployment
    /// names (`USE_EXTERNAL_LLM`, `LLM_PROVIDER`, `MODEL_N_CTX`, ...).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&'static str]| keys.iter().find_map(|k| lookup(k).map(|v| (*k, v)));

        if let Some((var, value)) = first(&["PITWALL_BACKEND"]) {
            self.llm.backend = match value.trim().to_lowercase().as_str() {
                "local" => BackendKind::Local,
                "remote" => BackendKind::Remote,
                _ => return Err(ConfigError::InvalidEnv { var: var.into(), value }),
            };
        } else if let Some((var, value)) = first(&["USE_EXTERNAL_LLM"]) {
            self.llm.backend = match value.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => BackendKind::Remote,
                "false" | "0" | "no" => BackendKind::Local,
                _ => return Err(ConfigError::InvalidEnv { var: var.into(), value }),
            };
        }

        if let Some((_, provider)) = first(&["PITWALL_PROVIDER", "LLM_PROVIDER"]) {
            self.llm.provider = provider.trim().to_lowercase();
        }
        if let Some((_, model)) = first(&["PITWALL_MODEL", "LLM_MODEL"]) {
            self.llm.model = model;
        }
        if self.llm.api_key.is_none() {
            let provider_var = format!(
                "{}_API_KEY",
                self.llm
                    .provider
                    .to_uppercase()
                    .replace(|c: char| !c.is_ascii_alphanumeric(), "_")
            );
            self.llm.api_key = lookup("PITWALL_API_KEY")
                .or_else(|| lookup("LLM_API_KEY"))
                .or_else(|| lookup(&provider_var))
                .or_else(|| match self.llm.provider.as_str() {
                    "huggingface" | "hf" => lookup("HF_TOKEN"),
                    _ => None,
                })
                .filter(|k| !k.trim().is_empty());
        }

        if let Some((_, path)) = first(&["PITWALL_MODEL_PATH", "MODEL_PATH"]) {
            self.local.model_path = PathBuf::from(path);
        }
        if let Some(v) = parse_env(&first(&["MODEL_N_THREADS"]))? {
            self.local.threads = v;
        }
        if let Some(v) = parse_env(&first(&["MODEL_N_CTX"]))? {
            self.local.context_size = v;
        }
        if let Some(v) = parse_env(&first(&["MODEL_N_BATCH"]))? {
            self.local.batch_size = v;
        }
        if let Some(v) = parse_env(&first(&["MODEL_TEMPERATURE"]))? {
            self.llm.temperature = v;
        }
        if let Some(v) = parse_env(&first(&["MODEL_MAX_TOKENS"]))? {
            self.llm.max_tokens = v;
        }
        if let Some(v) = parse_env(&first(&["PITWALL_TIMEOUT_SECS"]))? {
            self.llm.timeout_secs = v;
        }
        if let Some(v) = parse_env(&first(&["CONTEXT_WINDOW"]))? {
            self.dialogue.context_window = v;
        }
        if let Some(v) = parse_env(&first(&["MAX_CONVERSATION_HISTORY"]))? {
            self.dialogue.history_limit = v;
        }
        if let Some(v) = parse_env(&first(&["SENTIMENT_CACHE_SIZE"]))? {
            self.sentiment.cache_size = v;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".pitwall")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "llm.max_tokens must be > 0".into(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.timeout_secs must be > 0".into(),
            ));
        }
        if self.dialogue.npc_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "dialogue.npc_name must not be empty".into(),
            ));
        }
        if self.dialogue.context_window == 0
            || self.dialogue.context_window > self.dialogue.history_limit
        {
            return Err(ConfigError::ValidationError(format!(
                "dialogue.context_window must be between 1 and history_limit ({})",
                self.dialogue.history_limit
            )));
        }
        if self.local.threads == 0 || self.local.context_size == 0 || self.local.batch_size == 0
        {
            return Err(ConfigError::ValidationError(
                "local.threads, local.context_size and local.batch_size must be > 0".into(),
            ));
        }
        if self.local.batch_size > self.local.context_size {
            return Err(ConfigError::ValidationError(
                "local.batch_size must not exceed local.context_size".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the one backend this process will use.
    ///
    /// Fails when a remote provider is missing its endpoint or credentials.
    /// Those are configuration mistakes, reported once at startup.
    pub fn resolve_backend(&self) -> Result<ResolvedBackend, ConfigError> {
        if self.llm.backend == BackendKind::Local {
            return Ok(ResolvedBackend::Local(self.local.clone()));
        }

        let name = self.llm.provider.as_str();
        let overrides = self.providers.get(name).cloned().unwrap_or_default();
        let known = known_provider(name);

        let base_url = overrides
            .api_url
            .clone()
            .or_else(|| known.as_ref().map(|k| k.base_url.to_string()))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEndpoint {
                provider: name.to_string(),
            })?;

        let kind = overrides
            .kind
            .or_else(|| known.as_ref().map(|k| k.kind))
            .unwrap_or(ProviderKind::Chat);

        let credentials = if let Some(key) = overrides.api_key.clone().or_else(|| self.llm.api_key.clone()) {
            Credentials::Bearer(key)
        } else if let Some(username) = overrides.username.clone() {
            Credentials::Basic {
                username,
                password: overrides.password.clone(),
            }
        } else {
            Credentials::None
        };

        if credentials == Credentials::None && known.as_ref().is_some_and(|k| k.needs_credentials) {
            return Err(ConfigError::MissingCredential {
                provider: name.to_string(),
            });
        }

        Ok(ResolvedBackend::Remote(RemoteEndpoint {
            name: name.to_string(),
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: overrides.model.unwrap_or_else(|| self.llm.model.clone()),
            credentials,
        }))
    }

    /// A copy with every secret replaced by a marker, safe to print.
    pub fn redacted(&self) -> Self {
        let mask = |s: &Option<String>| s.as_ref().map(|_| "[REDACTED]".to_string());
        let mut copy = self.clone();
        copy.llm.api_key = mask(&self.llm.api_key);
        for provider in copy.providers.values_mut() {
            provider.api_key = mask(&provider.api_key);
            provider.password = mask(&provider.password);
        }
        copy
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(
    entry: &Option<(&str, String)>,
) -> Result<Option<T>, ConfigError> {
    match entry {
        None => Ok(None),
        Some((var, value)) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: (*var).to_string(),
                value: value.clone(),
            }),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: String, value: String },

    #[error("Provider '{provider}' requires an API key (set PITWALL_API_KEY or [providers.{provider}] api_key)")]
    MissingCredential { provider: String },

    #[error("Provider '{provider}' has no endpoint (set [providers.{provider}] api_url)")]
    MissingEndpoint { provider: String },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}
