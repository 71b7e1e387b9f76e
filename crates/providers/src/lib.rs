//! Text-generation backends for Pitwall.
//!
//! All backends implement the `pitwall_core::Provider` trait.
//! The router holds exactly one of them, chosen by configuration.

pub mod completion;
mod http;
#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod router;

pub use completion::{CompletionDialect, CompletionProvider};
#[cfg(feature = "local")]
pub use local::LocalProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{Generation, ModelRouter, build_from_config, truncate_at_stop};
