//! The car build workflow.
//!
//! The state is recomputed from the build record on every call: it is the
//! earliest slot not holding a canonical part, or `COMPLETE`. Nothing is
//! stored, so asking twice always gives the same answer. This module is the
//! single source of truth for what the NPC should ask for next.

use pitwall_core::{BuildState, Slot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Chassis,
    Engine,
    Tires,
    FrontWing,
    RearWing,
    Complete,
}

impl WorkflowState {
    pub fn from_slot(slot: Option<Slot>) -> Self {
        match slot {
            Some(Slot::Chassis) => Self::Chassis,
            Some(Slot::Engine) => Self::Engine,
            Some(Slot::Tires) => Self::Tires,
            Some(Slot::FrontWing) => Self::FrontWing,
            Some(Slot::RearWing) => Self::RearWing,
            None => Self::Complete,
        }
    }

    /// The slot this state asks for, `None` when complete.
    pub fn slot(self) -> Option<Slot> {
        match self {
            Self::Chassis => Some(Slot::Chassis),
            Self::Engine => Some(Slot::Engine),
            Self::Tires => Some(Slot::Tires),
            Self::FrontWing => Some(Slot::FrontWing),
            Self::RearWing => Some(Slot::RearWing),
            Self::Complete => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chassis => "CHASSIS",
            Self::Engine => "ENGINE",
            Self::Tires => "TIRES",
            Self::FrontWing => "FRONT_WING",
            Self::RearWing => "REAR_WING",
            Self::Complete => "COMPLETE",
        }
    }

    /// Lowercase label of the next step ("front wing", "complete").
    pub fn next_step_label(self) -> &'static str {
        self.slot().map(Slot::label).unwrap_or("complete")
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to ask the player for next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStep {
    pub state: WorkflowState,
    pub next_step: &'static str,
    /// A complete, in-character sentence naming the slot's two options.
    pub instruction: String,
}

/// Work out the next step for `build`, addressing the player by name.
///
/// An absent build gets a "let's start building" opener.
pub fn next_step(build: Option<&BuildState>, player_name: &str) -> WorkflowStep {
    let state = match build {
        None => WorkflowState::Chassis,
        Some(b) => WorkflowState::from_slot(b.first_missing()),
    };

    let instruction = match (build, state.slot()) {
        (None, _) => format!(
            "Let's start building your F1 car, {player_name}! First, choose your chassis: {}.",
            options(Slot::Chassis)
        ),
        (Some(_), Some(slot)) => instruction_for(slot, player_name),
        (Some(_), None) => format!(
            "Perfect, {player_name}! Your F1 car is fully built and race-ready. Click 'Submit Feedback' to finish!"
        ),
    };

    WorkflowStep {
        state,
        next_step: state.next_step_label(),
        instruction,
    }
}

fn instruction_for(slot: Slot, player_name: &str) -> String {
    let choices = options(slot);
    match slot {
        Slot::Chassis => format!("First step, {player_name}: choose your chassis - {choices}."),
        Slot::Engine => format!("Great chassis choice! Now select your engine: {choices}."),
        Slot::Tires => format!("Perfect! Time for tires: {choices}."),
        Slot::FrontWing => format!("Excellent! Choose your front wing: {choices}."),
        Slot::RearWing => format!("Final step! Pick your rear wing: {choices}."),
    }
}

/// "A or B" from the canonical table.
fn options(slot: Slot) -> String {
    let [a, b] = slot.options();
    format!("{a} or {b}")
}

/// One line per filled slot, in slot order.
pub fn progress_summary(build: Option<&BuildState>) -> String {
    let lines: Vec<String> = build
        .map(BuildState::filled)
        .unwrap_or_default()
        .into_iter()
        .map(|(slot, part)| format!("✅ {}: {}", slot.title(), part))
        .collect();

    if lines.is_empty() {
        "No parts selected yet".to_string()
    } else {
        lines.join("\n")
    }
}

/// The valid parts, grouped by slot, for the prompt's rules.
pub fn canonical_catalog() -> String {
    Slot::ALL
        .into_iter()
        .map(|slot| {
            let [a, b] = slot.options();
            format!("{}: {a} / {b}", slot.title())
        })
        .collect::<Vec<_>>()
        .join("; ")
}
