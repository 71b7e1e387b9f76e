//! Conversation history rendering.
//!
//! Turns the caller's stored history into the bounded text block the prompt
//! embeds. Two limits apply, in order:
//!
//! | Limit | Default | Trim Strategy |
//! |-------|---------|---------------|
//! | Turn window | last 15 turns | Oldest turns dropped |
//! | Token budget | 1500 estimated tokens (optional) | Oldest whole turns dropped |

pub mod token;
pub mod windower;

pub use windower::{ContextWindower, START_OF_CONVERSATION, clean_reply};
