//! Conversation engine and session state.
//!
//! The session owns history and selections; the engine borrows it mutably
//! for each ask and appends an exchange only after a successful reply.

pub mod engine;
pub mod history;
pub mod prompt;
pub mod session;

pub use engine::{AskAllPolicy, AskAllReport, ConversationEngine};
pub use history::ConversationHistory;
pub use session::Session;
