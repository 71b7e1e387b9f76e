//! End-to-end engine behavior with scripted backends.

use async_trait::async_trait;
use pitwall_core::{
    BuildState, Completion, GenerationRequest, Part, PlayerId, Provider, ProviderError, Slot, Turn,
};
use pitwall_engine::{
    ContentGuard, DialogueEngine, DialogueRequest, EngineError, EngineSettings, LexiconTagger,
    ReplyOutcome, WorkflowState,
};
use pitwall_providers::ModelRouter;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replies with a fixed text and records the prompts it was sent.
struct ScriptedProvider {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<Completion, ProviderError> {
        self.prompts.lock().unwrap().push(request.prompt);
        Ok(Completion {
            text: self.reply.clone(),
            model: request.model,
            usage: None,
        })
    }
}

/// Never answers.
struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: GenerationRequest) -> Result<Completion, ProviderError> {
        std::future::pending().await
    }
}

/// Always fails with the given error.
struct FailingProvider(ProviderError);

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: GenerationRequest) -> Result<Completion, ProviderError> {
        Err(self.0.clone())
    }
}

fn engine(provider: Arc<dyn Provider>) -> DialogueEngine {
    let router = ModelRouter::new(provider, "test-model", "Dax", Duration::from_secs(30));
    DialogueEngine::new(router, Arc::new(LexiconTagger::new()), EngineSettings::default())
}

fn request(dialogue: &str, build: Option<BuildState>) -> DialogueRequest {
    DialogueRequest {
        player_dialogue: dialogue.to_string(),
        sentiment_label: "neutral".to_string(),
        player_id: PlayerId(1),
        context: Vec::new(),
        player_name: "Sam".to_string(),
        build,
    }
}

fn complete_build() -> BuildState {
    Slot::ALL
        .into_iter()
        .fold(BuildState::new(), |b, slot| b.with(slot.options()[0]))
}

#[tokio::test]
async fn greeting_on_empty_build_asks_for_chassis() {
    let provider = ScriptedProvider::new("Dax: \"Hi\"");
    let result = engine(provider.clone())
        .respond(request("hi", None))
        .await
        .unwrap();

    assert_eq!(result.workflow_state, WorkflowState::Chassis);
    assert_eq!(result.outcome, ReplyOutcome::Degenerate);
    assert!(result.response.contains("Standard Monocoque"));
    assert!(result.response.contains("Ground Effect Optimized"));
    assert!(result.mentions_canonical_part);
    assert!(provider.last_prompt().ends_with("Dax:"));
}

#[tokio::test]
async fn generated_reply_is_cleaned_and_annotated() {
    let provider = ScriptedProvider::new(
        "Dax: \"Great to have you in the garage, Sam! Standard Monocoque is a solid start.\"\nPlayer: ok",
    );
    let result = engine(provider)
        .respond(request("hello!", None))
        .await
        .unwrap();

    assert_eq!(result.outcome, ReplyOutcome::Generated);
    assert_eq!(
        result.response,
        "Great to have you in the garage, Sam! Standard Monocoque is a solid start."
    );
    assert!(result.mentions_canonical_part);
    assert!(result.response_time_sec.is_some());
    assert!(result.sentiment_score.is_some());
    assert_eq!(result.reply_sentiment.as_deref(), Some("positive"));
}

#[tokio::test]
async fn complete_build_points_to_submit_feedback() {
    let provider = ScriptedProvider::new("");
    let result = engine(provider.clone())
        .respond(request("how's my car?", Some(complete_build())))
        .await
        .unwrap();

    assert_eq!(result.workflow_state, WorkflowState::Complete);
    assert!(result.response.contains("Submit Feedback"));
    assert!(provider.last_prompt().contains("WORKFLOW STATE: COMPLETE"));
}

#[tokio::test]
async fn hallucinated_reply_is_overridden() {
    let build = BuildState::new().with(Part::GroundEffectOptimized);
    let result = engine(ScriptedProvider::new("Ferrari V12 turbo"))
        .respond(request("what engine?", Some(build)))
        .await
        .unwrap();

    assert_eq!(result.outcome, ReplyOutcome::Overridden);
    assert!(result.mentions_canonical_part);
    assert!(ContentGuard::new().find_denied(&result.response).is_none());
    assert!(result.response.contains("2004 V10"));
    assert_eq!(result.workflow_state, WorkflowState::Engine);
}

#[tokio::test(start_paused = true)]
async fn timeout_falls_back_to_instruction() {
    let build = BuildState::new()
        .with(Part::StandardMonocoque)
        .with(Part::V8Of2006);
    let result = engine(Arc::new(HangingProvider))
        .respond(request("which tires?", Some(build)))
        .await
        .unwrap();

    assert_eq!(result.outcome, ReplyOutcome::Fallback);
    assert_eq!(result.response, "Perfect! Time for tires: C5 Slick or Full Wet.");
    assert!(result.response_time_sec.is_none());
    assert!(result.sentiment_score.is_none());
    assert!(result.mentions_canonical_part);
}

#[tokio::test(start_paused = true)]
async fn fallback_never_echoes_denied_names() {
    let mut req = request("hello?", None);
    req.player_name = "Ferrari Fan".into();
    let result = engine(Arc::new(HangingProvider)).respond(req).await.unwrap();

    assert_eq!(result.outcome, ReplyOutcome::Fallback);
    assert!(ContentGuard::new().find_denied(&result.response).is_none());
    assert!(result.response.contains("driver"));
    assert!(result.mentions_canonical_part);
}

#[tokio::test]
async fn repeated_role_prefix_is_stripped_not_discarded() {
    let provider = ScriptedProvider::new("Dax: Dax: Go with the Ground Effect Optimized chassis, Sam!");
    let result = engine(provider).respond(request("which chassis?", None)).await.unwrap();

    assert_eq!(result.outcome, ReplyOutcome::Generated);
    assert_eq!(result.response, "Go with the Ground Effect Optimized chassis, Sam!");
    assert!(result.mentions_canonical_part);
}

#[tokio::test]
async fn transport_errors_fall_back() {
    for error in [
        ProviderError::Network("connection refused".into()),
        ProviderError::ApiError {
            status_code: 502,
            message: "bad gateway".into(),
        },
        ProviderError::InvalidResponse("no choices".into()),
    ] {
        let result = engine(Arc::new(FailingProvider(error)))
            .respond(request("hi", None))
            .await
            .unwrap();
        assert_eq!(result.outcome, ReplyOutcome::Fallback);
        assert!(!result.response.is_empty());
    }
}

#[tokio::test]
async fn configuration_errors_surface() {
    let err = engine(Arc::new(FailingProvider(ProviderError::NotConfigured(
        "model file missing".into(),
    ))))
    .respond(request("hi", None))
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::Configuration(_)));
}

#[tokio::test]
async fn history_and_mood_reach_the_prompt() {
    let provider = ScriptedProvider::new("Let's go with High Lift up front, Sam!");
    let mut req = request("I'm so excited!", None);
    req.sentiment_label = "Happy".into();
    req.context = vec![Turn::new("hello", r#"{"response": "Dax: Welcome back!"}"#)];

    engine(provider.clone()).respond(req).await.unwrap();

    let prompt = provider.last_prompt();
    assert!(prompt.contains("Player: hello\nNPC: Welcome back!"));
    assert!(prompt.contains("Be excited and energetic!"));
    assert!(prompt.contains("Player says: \"I'm so excited!\""));
}

#[tokio::test]
async fn invalid_slot_values_are_not_progress() {
    let mut build = BuildState::new().with(Part::StandardMonocoque);
    build.set(Slot::Engine, "W16 quad-turbo");
    let result = engine(ScriptedProvider::new(""))
        .respond(request("done?", Some(build)))
        .await
        .unwrap();
    assert_eq!(result.workflow_state, WorkflowState::Engine);
}

#[test]
fn tag_player_uses_configured_tagger() {
    let e = engine(ScriptedProvider::new(""));
    assert_eq!(e.tag_player("this is awesome"), "positive");
    assert_eq!(e.tag_player("this is terrible"), "negative");
}
