//! Built-in sentiment taggers.
//!
//! [`LexiconTagger`] scores text against small word lists with negation and
//! intensifier handling. Polarity is the mean score of the sentiment-bearing
//! words, in [-1, 1]; above 0.1 is positive, below -0.1 negative.
//!
//! [`CachedTagger`] memoizes any tagger with a bounded LRU cache. Taggers
//! are pure, so cached readings never go stale.

use pitwall_core::{SentimentReading, SentimentTagger};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

const POSITIVE_THRESHOLD: f32 = 0.1;
const NEGATIVE_THRESHOLD: f32 = -0.1;

const POSITIVE: &[(&str, f32)] = &[
    ("amazing", 0.9),
    ("awesome", 0.9),
    ("best", 1.0),
    ("brilliant", 0.9),
    ("cool", 0.35),
    ("enjoy", 0.5),
    ("excellent", 1.0),
    ("excited", 0.6),
    ("fantastic", 0.8),
    ("fast", 0.2),
    ("fun", 0.3),
    ("glad", 0.5),
    ("good", 0.7),
    ("great", 0.8),
    ("happy", 0.8),
    ("like", 0.3),
    ("love", 0.5),
    ("nice", 0.6),
    ("perfect", 1.0),
    ("ready", 0.2),
    ("thanks", 0.2),
    ("thank", 0.2),
    ("win", 0.8),
    ("wonderful", 1.0),
    ("yes", 0.2),
];

const NEGATIVE: &[(&str, f32)] = &[
    ("angry", -0.5),
    ("annoying", -0.8),
    ("awful", -1.0),
    ("bad", -0.7),
    ("boring", -1.0),
    ("confused", -0.4),
    ("crash", -0.5),
    ("disappointed", -0.75),
    ("hate", -0.8),
    ("horrible", -1.0),
    ("lost", -0.3),
    ("mad", -0.6),
    ("sad", -0.5),
    ("slow", -0.3),
    ("stupid", -0.8),
    ("terrible", -1.0),
    ("tired", -0.4),
    ("ugh", -0.5),
    ("useless", -0.5),
    ("worst", -1.0),
    ("wrong", -0.5),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "dont", "don't", "isnt", "isn't", "cant", "can't", "wont", "won't"];

const INTENSIFIERS: &[(&str, f32)] = &[
    ("very", 1.3),
    ("really", 1.3),
    ("so", 1.2),
    ("super", 1.3),
    ("extremely", 1.5),
];

fn lookup(table: &[(&str, f32)], word: &str) -> Option<f32> {
    table.iter().find(|(w, _)| *w == word).map(|(_, s)| *s)
}

fn label_for(polarity: f32) -> &'static str {
    if polarity > POSITIVE_THRESHOLD {
        "positive"
    } else if polarity < NEGATIVE_THRESHOLD {
        "negative"
    } else {
        "neutral"
    }
}

/// Word-list sentiment classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconTagger;

impl LexiconTagger {
    pub fn new() -> Self {
        Self
    }

    /// Polarity in [-1, 1].
    pub fn polarity(&self, text: &str) -> f32 {
        let words: Vec<String> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        let mut total = 0.0;
        let mut scored = 0;
        for (i, word) in words.iter().enumerate() {
            let Some(mut score) = lookup(POSITIVE, word).or_else(|| lookup(NEGATIVE, word)) else {
                continue;
            };

            // Look back up to two words for a modifier: "not good", "not very good".
            for back in 1..=2 {
                let Some(prev) = i.checked_sub(back).map(|j| words[j].as_str()) else {
                    break;
                };
                if let Some(factor) = lookup(INTENSIFIERS, prev) {
                    score *= factor;
                } else if NEGATIONS.contains(&prev) {
                    score *= -0.5;
                    break;
                } else {
                    break;
                }
            }

            total += score.clamp(-1.0, 1.0);
            scored += 1;
        }

        if scored == 0 {
            0.0
        } else {
            (total / scored as f32).clamp(-1.0, 1.0)
        }
    }
}

impl SentimentTagger for LexiconTagger {
    fn analyze(&self, text: &str) -> SentimentReading {
        let polarity = self.polarity(text);
        SentimentReading {
            label: label_for(polarity).to_string(),
            polarity,
        }
    }
}

/// Bounded memoizing wrapper. Keys are the trimmed, lowercased text; the
/// least recently used entry is evicted first. A capacity of zero disables
/// caching.
pub struct CachedTagger<T> {
    inner: T,
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, SentimentReading>,
    /// Least recently used first.
    order: VecDeque<String>,
}

impl CacheState {
    fn touch(&mut self, key: &str) {
        if let Some(at) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(at) {
                self.order.push_back(k);
            }
        }
    }
}

impl<T: SentimentTagger> CachedTagger<T> {
    pub fn new(inner: T, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // Entries are immutable once inserted, so a poisoned lock still
        // holds a consistent map.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: SentimentTagger> SentimentTagger for CachedTagger<T> {
    fn analyze(&self, text: &str) -> SentimentReading {
        if self.capacity == 0 {
            return self.inner.analyze(text);
        }

        let key = text.trim().to_lowercase();
        {
            let mut state = self.lock();
            if let Some(hit) = state.entries.get(&key).cloned() {
                state.touch(&key);
                return hit;
            }
        }

        let reading = self.inner.analyze(text);

        let mut state = self.lock();
        if !state.entries.contains_key(&key) {
            while state.order.len() >= self.capacity {
                match state.order.pop_front() {
                    Some(oldest) => {
                        state.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            state.order.push_back(key.clone());
            state.entries.insert(key, reading.clone());
        }
        reading
    }
}
