//! The dialogue orchestration engine: the heart of Pitwall.
//!
//! One call to [`DialogueEngine::respond`] runs a fixed pipeline:
//!
//! 1. **Compose**: window the history, work out the next build step, pick
//!    the mood directive and assemble the prompt
//! 2. **Generate**: invoke the configured backend through the model router
//! 3. **Sanitize**: strip role prefixes, prompt echo and wrapping quotes
//! 4. **Guard**: replace degenerate or off-canon replies with the tracker's
//!    instruction
//! 5. **Annotate**: tag the final reply's sentiment and latency
//!
//! A transport failure during generation short-circuits to a deterministic
//! fallback reply. The engine never persists anything.

pub mod context;
pub mod guard;
pub mod orchestrator;
pub mod prompt;
pub mod sanitizer;
pub mod sentiment;
pub mod workflow;

pub use context::{ContextWindower, START_OF_CONVERSATION};
pub use guard::{ContentGuard, GuardOutcome, GuardVerdict};
pub use orchestrator::{
    DialogueEngine, DialogueRequest, EngineError, EngineResult, EngineSettings, ReplyOutcome,
};
pub use prompt::{PromptComposer, PromptInputs, mood_directive};
pub use sanitizer::ResponseSanitizer;
pub use sentiment::{CachedTagger, LexiconTagger};
pub use workflow::{WorkflowState, WorkflowStep};
