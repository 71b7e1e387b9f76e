//! # Pitwall Core
//!
//! Domain types, traits, and error definitions for the Pitwall dialogue engine.
//! This crate has **zero framework dependencies**: it defines the domain model
//! (turns, the car build record, the canonical parts table) and the seams
//! (`Provider`, `SentimentTagger`) that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping model backends via configuration
//! - Testing the engine with scripted fake backends
//! - Clean dependency graph (all crates depend inward on core)

pub mod build;
pub mod dialogue;
pub mod error;
pub mod provider;
pub mod sentiment;

// Re-export key types at crate root for ergonomics
pub use build::{BuildState, Part, Slot, SlotValue};
pub use dialogue::{PlayerId, Turn};
pub use error::{Error, ProviderError, Result};
pub use provider::{Completion, GenerationRequest, Provider, Usage};
pub use sentiment::{SentimentReading, SentimentTagger};
