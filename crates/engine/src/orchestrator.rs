//! The dialogue engine: one player utterance in, one validated reply out.

use crate::context::ContextWindower;
use crate::guard::{ContentGuard, GuardOutcome};
use crate::prompt::{PromptComposer, PromptInputs, mood_directive};
use crate::sanitizer::ResponseSanitizer;
use crate::sentiment::{CachedTagger, LexiconTagger};
use crate::workflow::{self, WorkflowState};
use pitwall_config::{AppConfig, ConfigError};
use pitwall_core::{BuildState, PlayerId, SentimentTagger, Turn};
use pitwall_providers::ModelRouter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name used when the caller has no display name for the player.
const DEFAULT_PLAYER_NAME: &str = "driver";

/// Everything the caller knows about the current exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueRequest {
    pub player_dialogue: String,
    /// Sentiment label of `player_dialogue` ("positive", "neutral", ...).
    pub sentiment_label: String,
    pub player_id: PlayerId,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub context: Vec<Turn>,
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub build: Option<BuildState>,
}

/// How the final reply came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// The model's reply, cleaned up.
    Generated,
    /// The model produced (almost) nothing; the instruction was used.
    Degenerate,
    /// The model went off-canon; the instruction was used.
    Overridden,
    /// The backend failed; the instruction was used.
    Fallback,
}

impl From<GuardOutcome> for ReplyOutcome {
    fn from(outcome: GuardOutcome) -> Self {
        match outcome {
            GuardOutcome::Accepted => Self::Generated,
            GuardOutcome::Degenerate => Self::Degenerate,
            GuardOutcome::Overridden => Self::Overridden,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    /// Never empty.
    pub response: String,
    /// Backend latency in seconds, two decimals. `None` on fallback.
    pub response_time_sec: Option<f64>,
    /// Polarity of the reply, three decimals. `None` on fallback.
    pub sentiment_score: Option<f64>,
    pub mentions_canonical_part: bool,
    /// Sentiment label of the reply. `None` on fallback.
    pub reply_sentiment: Option<String>,
    pub outcome: ReplyOutcome,
    pub workflow_state: WorkflowState,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The backend can never succeed as configured. Not retryable.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

/// Tunables the engine reads once at construction.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub npc_name: String,
    pub context_window: usize,
    pub context_token_budget: Option<usize>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            npc_name: config.dialogue.npc_name.clone(),
            context_window: config.dialogue.context_window,
            context_token_budget: config.dialogue.context_token_budget,
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        }
    }
}

/// Turns (utterance, history, build) into a validated NPC reply.
pub struct DialogueEngine {
    router: ModelRouter,
    tagger: Arc<dyn SentimentTagger>,
    windower: ContextWindower,
    composer: PromptComposer,
    sanitizer: ResponseSanitizer,
    guard: ContentGuard,
    max_tokens: u32,
    temperature: f32,
}

impl DialogueEngine {
    pub fn new(router: ModelRouter, tagger: Arc<dyn SentimentTagger>, settings: EngineSettings) -> Self {
        Self {
            router,
            tagger,
            windower: ContextWindower::new(settings.context_window, &settings.npc_name)
                .with_token_budget(settings.context_token_budget),
            composer: PromptComposer::new(&settings.npc_name),
            sanitizer: ResponseSanitizer::new(&settings.npc_name),
            guard: ContentGuard::new(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }

    /// Engine with the built-in lexicon tagger behind the configured cache.
    pub fn from_config(config: &AppConfig, router: ModelRouter) -> Self {
        let tagger = Arc::new(CachedTagger::new(
            LexiconTagger::new(),
            config.sentiment.cache_size,
        ));
        Self::new(router, tagger, EngineSettings::from_config(config))
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// Label an incoming utterance, for callers that have no label.
    pub fn tag_player(&self, text: &str) -> String {
        self.tagger.label(text)
    }

    /// The prompt `respond` would send for `request`.
    pub fn compose_prompt(&self, request: &DialogueRequest) -> String {
        let player_name = display_name(&request.player_name);
        let build = request.build.as_ref();
        let step = workflow::next_step(build, player_name);
        let summary = workflow::progress_summary(build);
        let context = self.windower.render(&request.context);

        self.composer.compose(&PromptInputs {
            player_name,
            sentiment_label: &request.sentiment_label,
            mood_directive: mood_directive(&request.sentiment_label),
            build_summary: &summary,
            windowed_context: &context,
            player_dialogue: &request.player_dialogue,
            step: &step,
        })
    }

    /// Produce the NPC's reply.
    ///
    /// Transport failures never surface as errors: they yield the tracker's
    /// instruction with null telemetry. Only configuration problems do.
    pub async fn respond(&self, request: DialogueRequest) -> Result<EngineResult, EngineError> {
        let player_name = display_name(&request.player_name);
        let build = request.build.as_ref();
        let step = workflow::next_step(build, player_name);
        let prompt = self.compose_prompt(&request);

        debug!(
            player_id = %request.player_id,
            state = %step.state,
            prompt_chars = prompt.len(),
            "Prompt composed"
        );

        let generation = match self
            .router
            .invoke(&prompt, self.max_tokens, self.temperature)
            .await
        {
            Ok(generation) => generation,
            Err(e) if e.is_configuration() => {
                return Err(EngineError::Configuration(e.to_string()));
            }
            Err(e) => {
                warn!(
                    player_id = %request.player_id,
                    provider = %self.router.provider_name(),
                    error = %e,
                    "Generation failed, using workflow fallback"
                );
                let response = self.guard.substitute(build, player_name);
                let result = EngineResult {
                    mentions_canonical_part: self.guard.mentions_canonical_part(&response),
                    response,
                    response_time_sec: None,
                    sentiment_score: None,
                    reply_sentiment: None,
                    outcome: ReplyOutcome::Fallback,
                    workflow_state: step.state,
                };
                log_result(request.player_id, &result);
                return Ok(result);
            }
        };

        let cleaned = self.sanitizer.sanitize(&generation.text);
        let verdict = self.guard.check(&cleaned, build, player_name);
        let reading = self.tagger.analyze(&verdict.text);

        let result = EngineResult {
            response: verdict.text,
            response_time_sec: Some(round_to(generation.latency.as_secs_f64(), 2)),
            sentiment_score: Some(round_to(f64::from(reading.polarity), 3)),
            mentions_canonical_part: verdict.mentions_canonical_part,
            reply_sentiment: Some(reading.label),
            outcome: verdict.outcome.into(),
            workflow_state: step.state,
        };
        log_result(request.player_id, &result);
        Ok(result)
    }
}

fn display_name(name: &str) -> &str {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_PLAYER_NAME
    } else {
        trimmed
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn log_result(player_id: PlayerId, result: &EngineResult) {
    info!(
        player_id = %player_id,
        outcome = ?result.outcome,
        state = %result.workflow_state,
        latency_ms = result.response_time_sec.map(|s| (s * 1000.0) as u64),
        mentions_canonical_part = result.mentions_canonical_part,
        "Reply ready"
    );
}
