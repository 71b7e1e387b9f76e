//! `pitwall prompt` — Print the prompt the engine would send, no model needed.

use std::path::Path;

use pitwall_core::{BuildState, PlayerId, Slot};
use pitwall_engine::{DialogueEngine, DialogueRequest};
use pitwall_providers::ModelRouter;

use super::load_config;

/// Slot values as flags. Values are stored as given, so invalid ones can be
/// previewed too.
#[derive(Debug, Default, clap::Args)]
pub struct BuildArgs {
    #[arg(long)]
    pub chassis: Option<String>,
    #[arg(long)]
    pub engine: Option<String>,
    #[arg(long)]
    pub tires: Option<String>,
    #[arg(long)]
    pub front_wing: Option<String>,
    #[arg(long)]
    pub rear_wing: Option<String>,
}

impl BuildArgs {
    /// `None` when no slot flag was given.
    pub fn into_build(self) -> Option<BuildState> {
        let values = [
            (Slot::Chassis, self.chassis),
            (Slot::Engine, self.engine),
            (Slot::Tires, self.tires),
            (Slot::FrontWing, self.front_wing),
            (Slot::RearWing, self.rear_wing),
        ];
        let mut build = BuildState::new();
        let mut any = false;
        for (slot, value) in values {
            if let Some(value) = value {
                build.set(slot, value);
                any = true;
            }
        }
        any.then_some(build)
    }
}

pub async fn run(
    config_path: Option<&Path>,
    message: String,
    name: String,
    sentiment: Option<String>,
    build: BuildArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let engine = offline_engine(&config);

    let sentiment_label = sentiment.unwrap_or_else(|| engine.tag_player(&message));
    let request = DialogueRequest {
        player_dialogue: message,
        sentiment_label,
        player_id: PlayerId(0),
        context: Vec::new(),
        player_name: name,
        build: build.into_build(),
    };

    println!("{}", engine.compose_prompt(&request));
    Ok(())
}

/// An engine whose backend is never called; only prompt assembly is used.
fn offline_engine(config: &pitwall_config::AppConfig) -> DialogueEngine {
    struct Offline;

    #[async_trait::async_trait]
    impl pitwall_core::Provider for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        async fn complete(
            &self,
            _request: pitwall_core::GenerationRequest,
        ) -> Result<pitwall_core::Completion, pitwall_core::ProviderError> {
            Err(pitwall_core::ProviderError::NotConfigured(
                "prompt preview does not call a model".into(),
            ))
        }
    }

    let router = ModelRouter::new(
        std::sync::Arc::new(Offline),
        config.llm.model.clone(),
        &config.dialogue.npc_name,
        std::time::Duration::from_secs(config.llm.timeout_secs),
    );
    DialogueEngine::from_config(config, router)
}
