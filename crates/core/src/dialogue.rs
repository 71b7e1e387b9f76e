//! Conversation value objects supplied by the persistence layer.

use serde::{Deserialize, Serialize};

/// Identifier of the player the NPC is talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One exchanged pair: what the player said and what the NPC answered.
///
/// History is passed to the engine oldest first. Turns are never edited once
/// created; `npc_reply` may still carry legacy formatting (a JSON wrapper or a
/// role prefix) from older releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub dialogue: String,
    pub npc_reply: String,
}

impl Turn {
    pub fn new(dialogue: impl Into<String>, npc_reply: impl Into<String>) -> Self {
        Self {
            dialogue: dialogue.into(),
            npc_reply: npc_reply.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_deserializes_from_persisted_row() {
        let turn: Turn =
            serde_json::from_str(r#"{"dialogue":"hi","npc_reply":"Hey there!"}"#).unwrap();
        assert_eq!(turn, Turn::new("hi", "Hey there!"));
    }

    #[test]
    fn player_id_display() {
        assert_eq!(PlayerId(42).to_string(), "42");
    }
}
