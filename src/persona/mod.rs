//! Persona records: the static investor profiles grouped by segment.
//!
//! The store is loaded once at startup and is read-only afterwards.

pub mod registry;
pub mod store;
pub mod types;

pub use store::{PersonaStore, SegmentFilter};
pub use types::{Persona, PersonaEntry, PersonaKey};
