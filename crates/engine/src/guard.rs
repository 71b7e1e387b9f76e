//! Content guard: keeps replies inside the game's canon.
//!
//! Matching is case-insensitive substring containment against two deny-lists
//! (real-world brands and part categories the game does not have). A hit
//! discards the reply in favour of the workflow instruction for the current
//! build. Replies shorter than six characters are treated as degenerate and
//! replaced the same way.

use crate::workflow;
use pitwall_core::{BuildState, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Real-world teams, manufacturers and suppliers.
pub const DENY_BRANDS: &[&str] = &[
    "ferrari",
    "mercedes",
    "red bull",
    "mclaren",
    "williams",
    "renault",
    "honda",
    "lamborghini",
    "porsche",
    "pirelli",
    "bridgestone",
    "michelin",
    "aston martin",
    "toyota",
    "bmw",
];

/// Part categories that exist in real cars but not in the game.
pub const DENY_PARTS: &[&str] = &[
    "turbo",
    "v12",
    "v6",
    "spoiler",
    "nitrous",
    "gearbox",
    "suspension",
    "exhaust",
    "supercharger",
    "intercooler",
];

/// Replies with fewer characters than this are degenerate.
pub const MIN_REPLY_CHARS: usize = 6;

/// Name used in the substitute when the player's own name trips the
/// deny-list.
const NEUTRAL_NAME: &str = "driver";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardOutcome {
    /// The reply passed unchanged.
    Accepted,
    /// Empty or too short; replaced by the instruction.
    Degenerate,
    /// Mentioned forbidden vocabulary; replaced by the instruction.
    Overridden,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardVerdict {
    pub text: String,
    pub mentions_canonical_part: bool,
    pub outcome: GuardOutcome,
}

#[derive(Debug, Clone)]
pub struct ContentGuard {
    deny_terms: Vec<&'static str>,
    allow_phrases: Vec<String>,
}

impl Default for ContentGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentGuard {
    pub fn new() -> Self {
        let deny_terms = DENY_BRANDS.iter().chain(DENY_PARTS).copied().collect();
        let mut allow_phrases: Vec<String> = Part::ALL
            .into_iter()
            .flat_map(|p| [p.phrase().to_string(), p.label().to_lowercase()])
            .collect();
        allow_phrases.sort();
        allow_phrases.dedup();
        Self {
            deny_terms,
            allow_phrases,
        }
    }

    /// The first deny-listed term contained in `text`, if any.
    pub fn find_denied(&self, text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        self.deny_terms.iter().copied().find(|t| lower.contains(t))
    }

    /// Does `text` name at least one canonical part?
    pub fn mentions_canonical_part(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.allow_phrases.iter().any(|p| lower.contains(p.as_str()))
    }

    /// Validate a sanitized reply.
    pub fn check(&self, text: &str, build: Option<&BuildState>, player_name: &str) -> GuardVerdict {
        let text = text.trim();

        if text.chars().count() < MIN_REPLY_CHARS {
            debug!(chars = text.chars().count(), "Degenerate reply replaced");
            let substitute = self.substitute(build, player_name);
            return GuardVerdict {
                mentions_canonical_part: self.mentions_canonical_part(&substitute),
                text: substitute,
                outcome: GuardOutcome::Degenerate,
            };
        }

        if let Some(term) = self.find_denied(text) {
            warn!(term, "Reply mentioned non-canonical vocabulary, overriding");
            return GuardVerdict {
                text: self.substitute(build, player_name),
                mentions_canonical_part: true,
                outcome: GuardOutcome::Overridden,
            };
        }

        GuardVerdict {
            mentions_canonical_part: self.mentions_canonical_part(text),
            text: text.to_string(),
            outcome: GuardOutcome::Accepted,
        }
    }

    /// The tracker's instruction, with the player's name swapped out if it
    /// would smuggle a denied term back in.
    pub fn substitute(&self, build: Option<&BuildState>, player_name: &str) -> String {
        let instruction = workflow::next_step(build, player_name).instruction;
        if self.find_denied(&instruction).is_none() {
            return instruction;
        }
        workflow::next_step(build, NEUTRAL_NAME).instruction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_core::Slot;

    fn guard() -> ContentGuard {
        ContentGuard::new()
    }

    #[test]
    fn accepts_on_canon_reply() {
        let v = guard().check("Go with the 2004 V10, Sam!", None, "Sam");
        assert_eq!(v.outcome, GuardOutcome::Accepted);
        assert_eq!(v.text, "Go with the 2004 V10, Sam!");
        assert!(v.mentions_canonical_part);
    }

    #[test]
    fn accepted_small_talk_has_no_mention() {
        let v = guard().check("Hey Sam, great to see you!", None, "Sam");
        assert_eq!(v.outcome, GuardOutcome::Accepted);
        assert!(!v.mentions_canonical_part);
    }

    #[test]
    fn hallucinated_parts_are_overridden() {
        let build = BuildState::new().with(Part::StandardMonocoque);
        let v = guard().check("Ferrari V12 turbo", Some(&build), "Sam");
        assert_eq!(v.outcome, GuardOutcome::Overridden);
        assert!(v.mentions_canonical_part);
        assert!(v.text.contains("2004 V10"));
        assert!(guard().find_denied(&v.text).is_none());
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(guard().find_denied("Try a SPOILER"), Some("spoiler"));
        assert_eq!(guard().find_denied("the Red Bull way"), Some("red bull"));
    }

    #[test]
    fn short_reply_is_degenerate() {
        let v = guard().check("ok", None, "Sam");
        assert_eq!(v.outcome, GuardOutcome::Degenerate);
        assert!(v.text.starts_with("Let's start building your F1 car, Sam!"));
        assert!(v.mentions_canonical_part);
    }

    #[test]
    fn degenerate_on_complete_build_congratulates() {
        let build = Slot::ALL
            .into_iter()
            .fold(BuildState::new(), |b, s| b.with(s.options()[1]));
        let v = guard().check("", Some(&build), "Sam");
        assert_eq!(v.outcome, GuardOutcome::Degenerate);
        assert!(v.text.contains("Submit Feedback"));
        assert!(!v.mentions_canonical_part);
    }

    #[test]
    fn player_name_cannot_reintroduce_denied_terms() {
        let v = guard().check("Mercedes all the way!", None, "Ferrari Fan");
        assert_eq!(v.outcome, GuardOutcome::Overridden);
        assert!(v.text.contains("driver"));
        assert!(guard().find_denied(&v.text).is_none());
    }

    #[test]
    fn guard_output_never_contains_denied_terms() {
        let g = guard();
        let names = ["Sam", "Porsche", "Mr Turbo", "Williams"];
        let replies = [
            "",
            "hmm",
            "Try a turbo!",
            "Pirelli slicks are best",
            "Pick High Lift, friend.",
        ];
        for name in names {
            for reply in replies {
                for k in 0..=5 {
                    let build = Slot::ALL
                        .into_iter()
                        .take(k)
                        .fold(BuildState::new(), |b, s| b.with(s.options()[0]));
                    let v = g.check(reply, Some(&build), name);
                    assert!(
                        g.find_denied(&v.text).is_none(),
                        "{name:?} / {reply:?} / k={k} -> {:?}",
                        v.text
                    );
                }
            }
        }
    }
}
