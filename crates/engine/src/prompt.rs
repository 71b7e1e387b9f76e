//! Prompt assembly.
//!
//! The prompt is plain text ending with the NPC's role cue, so the same
//! string works for chat endpoints, raw completion endpoints and the local
//! model. Assembly is deterministic: identical inputs always produce
//! byte-identical prompts.

use crate::workflow::{WorkflowStep, canonical_catalog};

/// Persona instruction for a sentiment label. Case-insensitive; unknown
/// labels get a cautious default.
pub fn mood_directive(sentiment_label: &str) -> &'static str {
    match sentiment_label.trim().to_lowercase().as_str() {
        "positive" | "happy" => "Be excited and energetic!",
        "negative" | "sad" => "Be warm and encouraging.",
        "angry" => "Stay calm and professional.",
        "neutral" => "Be friendly and helpful.",
        _ => "Be professional and focused.",
    }
}

/// Everything one prompt is built from.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub player_name: &'a str,
    pub sentiment_label: &'a str,
    pub mood_directive: &'a str,
    pub build_summary: &'a str,
    pub windowed_context: &'a str,
    pub player_dialogue: &'a str,
    pub step: &'a WorkflowStep,
}

#[derive(Debug, Clone)]
pub struct PromptComposer {
    npc_name: String,
    catalog: String,
}

impl PromptComposer {
    pub fn new(npc_name: impl Into<String>) -> Self {
        Self {
            npc_name: npc_name.into(),
            catalog: canonical_catalog(),
        }
    }

    pub fn npc_name(&self) -> &str {
        &self.npc_name
    }

    pub fn compose(&self, input: &PromptInputs<'_>) -> String {
        let npc = &self.npc_name;
        let player = input.player_name;
        let step = input.step;

        format!(
            "You are {npc}, a witty, enthusiastic F1 race engineer helping {player} build the perfect race car in this game.
Stay in character at all times: never say or imply that you are an AI, a robot, a language model or an automated system.
Only ever mention these parts: {catalog}. Never mention real-world teams, brands, manufacturers or any other car parts.

WORKFLOW STATE: {state}
NEXT STEP: {next}
INSTRUCTION: {instruction}

BUILD PROGRESS:
{summary}

RULES:
1. Only ask about the next missing part (Chassis -> Engine -> Tires -> Front Wing -> Rear Wing). Never repeat completed steps.
2. If the build is complete, congratulate {player} and suggest clicking \"Submit Feedback\".
3. If {player} greets you or makes small talk, answer with one friendly sentence, then give the next build hint.
4. If {player} goes off-topic, acknowledge it briefly and steer back to the build.
5. Address {player} by name, never as \"Player\".
6. Keep it to 1-2 short sentences with a racing flavour.

MOOD ({sentiment}): {mood}

RECENT CHAT:
{context}

Player says: \"{dialogue}\"

{npc}:",
            catalog = self.catalog,
            state = step.state,
            next = step.next_step,
            instruction = step.instruction,
            summary = input.build_summary,
            sentiment = input.sentiment_label.trim(),
            mood = input.mood_directive,
            context = input.windowed_context.trim_end(),
            dialogue = input.player_dialogue.trim(),
        )
    }
}
