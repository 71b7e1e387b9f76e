//! `pitwall chat` — Interactive or single-message conversation with the NPC.
//!
//! History and the build record live in memory for the length of the
//! session; the engine windows the history itself.

use std::io::Write;
use std::path::Path;

use pitwall_core::{BuildState, Part, PlayerId, Slot, Turn};
use pitwall_engine::{DialogueEngine, DialogueRequest, EngineError, EngineResult, workflow};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::load_config;

/// One line of REPL input.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Say(&'a str),
    ShowBuild,
    SetPart(Part),
    BadBuild(String),
    Reset,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    match line {
        "/quit" | "/exit" | "exit" => return Input::Quit,
        "/reset" => return Input::Reset,
        "/build" => return Input::ShowBuild,
        _ => {}
    }
    let Some(rest) = line.strip_prefix("/build ") else {
        return Input::Say(line);
    };

    let words: Vec<&str> = rest.split_whitespace().collect();
    // Slot names are one or two words ("engine", "front wing").
    for n in (1..=words.len().min(2)).rev() {
        let Some(slot) = Slot::from_name(&words[..n].join(" ")) else {
            continue;
        };
        let value = words[n..].join(" ");
        return match Part::parse(slot, &value) {
            Some(part) => Input::SetPart(part),
            None => {
                let [a, b] = slot.options();
                Input::BadBuild(format!("{} must be {a} or {b}", slot.title()))
            }
        };
    }
    Input::BadBuild(format!("Unknown slot in '{rest}'"))
}

/// A conversation held in memory.
pub struct Session {
    engine: DialogueEngine,
    player_id: PlayerId,
    player_name: String,
    history: Vec<Turn>,
    history_limit: usize,
    build: BuildState,
}

impl Session {
    pub fn new(
        engine: DialogueEngine,
        player_id: PlayerId,
        player_name: impl Into<String>,
        history_limit: usize,
    ) -> Self {
        Self {
            engine,
            player_id,
            player_name: player_name.into(),
            history: Vec::new(),
            history_limit,
            build: BuildState::new(),
        }
    }

    pub fn build(&self) -> &BuildState {
        &self.build
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn select(&mut self, part: Part) {
        self.build = std::mem::take(&mut self.build).with(part);
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.build = BuildState::new();
    }

    /// Send one utterance and record the exchange.
    pub async fn say(&mut self, text: &str) -> Result<EngineResult, EngineError> {
        let request = DialogueRequest {
            player_dialogue: text.to_string(),
            sentiment_label: self.engine.tag_player(text),
            player_id: self.player_id,
            context: self.history.clone(),
            player_name: self.player_name.clone(),
            build: Some(self.build.clone()),
        };
        let result = self.engine.respond(request).await?;

        self.history.push(Turn::new(text, result.response.clone()));
        if self.history.len() > self.history_limit {
            let excess = self.history.len() - self.history_limit;
            self.history.drain(..excess);
        }
        Ok(result)
    }
}

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
    name: String,
    player_id: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let router = pitwall_providers::build_from_config(&config)
        .map_err(|e| format!("Failed to set up backend: {e}"))?;

    // Loads the local model up front instead of on the first message.
    if let Err(e) = router.health_check().await {
        if e.is_configuration() {
            return Err(format!("Backend is not usable: {e}").into());
        }
        tracing::warn!(error = %e, "Backend health check failed; replies will fall back");
    }

    let provider = router.provider_name().to_string();
    let model = router.model().to_string();
    let engine = DialogueEngine::from_config(&config, router);
    let mut session = Session::new(
        engine,
        PlayerId(player_id),
        name.clone(),
        config.dialogue.history_limit,
    );

    if let Some(msg) = message {
        // Single message mode
        let result = session.say(&msg).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let npc = &config.dialogue.npc_name;
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Pitwall — Garage Conversation        ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Backend:   {provider}");
    println!("  Model:     {model}");
    println!("  Engineer:  {npc}");
    println!("  Driver:    {name}");
    println!();
    println!("  /build <slot> <part>  pick a part     /build  show progress");
    println!("  /reset                start over      /quit   leave");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => break,
            Input::Empty => {}
            Input::Reset => {
                session.reset();
                println!("  ✅ Build and history cleared");
            }
            Input::ShowBuild => {
                for line in workflow::progress_summary(Some(session.build())).lines() {
                    println!("  {line}");
                }
            }
            Input::SetPart(part) => {
                session.select(part);
                println!("  ✅ {}: {part}", part.slot().title());
            }
            Input::BadBuild(reason) => println!("  ⚠️  {reason}"),
            Input::Say(text) => {
                eprint!("  ...");
                match session.say(text).await {
                    Ok(result) => {
                        eprint!("\r     \r");
                        println!();
                        println!("  {npc} > {}", result.response);
                        tracing::debug!(
                            outcome = ?result.outcome,
                            state = %result.workflow_state,
                            "Turn complete"
                        );
                        println!();
                    }
                    Err(e) => {
                        eprint!("\r     \r");
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  See you on the grid! 🏁");
    println!();

    Ok(())
}
