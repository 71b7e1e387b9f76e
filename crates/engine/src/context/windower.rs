//! Sliding window over stored conversation turns.
//!
//! # Determinism
//!
//! Rendering is a pure function of the turns and the two limits. Malformed
//! stored replies are used verbatim; rendering never fails.

use crate::context::token;
use crate::sanitizer::{ResponseSanitizer, strip_wrapping_quotes};
use pitwall_core::Turn;
use tracing::debug;

/// Rendered when there is no history at all.
pub const START_OF_CONVERSATION: &str = "This is the start of the conversation.";

/// Renders the most recent turns as `Player: ...\nNPC: ...\n` lines.
#[derive(Debug, Clone)]
pub struct ContextWindower {
    max_turns: usize,
    token_budget: Option<usize>,
    sanitizer: ResponseSanitizer,
}

impl ContextWindower {
    /// Keep at most `max_turns` turns; replies are cleaned of `npc_name:`
    /// prefixes.
    pub fn new(max_turns: usize, npc_name: &str) -> Self {
        Self {
            max_turns,
            token_budget: None,
            sanitizer: ResponseSanitizer::new(npc_name),
        }
    }

    /// Additionally cap the block at an estimated token count.
    pub fn with_token_budget(mut self, budget: Option<usize>) -> Self {
        self.token_budget = budget;
        self
    }

    /// Render `turns` (oldest first).
    pub fn render(&self, turns: &[Turn]) -> String {
        let window = &turns[turns.len().saturating_sub(self.max_turns)..];
        if window.is_empty() {
            return START_OF_CONVERSATION.to_string();
        }

        let lines: Vec<String> = window.iter().map(|t| self.render_turn(t)).collect();

        let Some(budget) = self.token_budget else {
            return lines.concat();
        };

        // Walk newest to oldest and stop at the first turn that does not fit,
        // so what remains is always a contiguous run of the latest turns.
        // The newest turn is kept even if it alone is over budget.
        let mut used = 0;
        let mut kept = 0;
        for line in lines.iter().rev() {
            let cost = token::estimate_tokens(line);
            if kept > 0 && used + cost > budget {
                break;
            }
            used += cost;
            kept += 1;
        }

        if kept < lines.len() {
            debug!(
                dropped = lines.len() - kept,
                tokens = used,
                budget,
                "Oldest turns dropped to fit the context budget"
            );
        }

        lines[lines.len() - kept..].concat()
    }

    fn render_turn(&self, turn: &Turn) -> String {
        format!(
            "Player: {}\nNPC: {}\n",
            turn.dialogue.trim(),
            clean_reply(&self.sanitizer, &turn.npc_reply)
        )
    }
}

/// Normalize a stored NPC reply: unwrap a `{"response": ...}` JSON wrapper,
/// then strip leading role prefixes and one pair of wrapping quotes.
pub fn clean_reply(sanitizer: &ResponseSanitizer, stored: &str) -> String {
    let trimmed = stored.trim();
    let unwrapped = unwrap_json_reply(trimmed);
    let text = unwrapped.as_deref().unwrap_or(trimmed);
    let text = sanitizer.strip_role_prefixes(text.trim());
    strip_wrapping_quotes(text).to_string()
}

/// Replies stored by older releases as JSON objects with a `response` field.
fn unwrap_json_reply(text: &str) -> Option<String> {
    if !text.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value.get("response")?.as_str().map(String::from)
}
