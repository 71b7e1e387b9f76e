//! SentimentTagger trait: classifies a piece of dialogue.
//!
//! The engine calls a tagger on the NPC's reply (and callers may use the same
//! tagger on the player's utterance). Which classifier sits behind it is not
//! the engine's concern.

use serde::{Deserialize, Serialize};

/// Result of tagging one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    /// Coarse label: "positive", "neutral" or "negative".
    pub label: String,

    /// Polarity in [-1.0, 1.0].
    pub polarity: f32,
}

impl SentimentReading {
    pub fn neutral() -> Self {
        Self {
            label: "neutral".into(),
            polarity: 0.0,
        }
    }
}

/// A pure text -> sentiment function.
///
/// Implementations must be deterministic for a given text, which is what makes
/// memoizing them safe.
pub trait SentimentTagger: Send + Sync {
    fn analyze(&self, text: &str) -> SentimentReading;

    /// Label only.
    fn label(&self, text: &str) -> String {
        self.analyze(text).label
    }
}
