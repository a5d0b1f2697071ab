//! Session context: history plus the user's current selections.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::persona::{PersonaKey, SegmentFilter};

use super::history::ConversationHistory;

/// Everything that lives for one interactive run.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub history: ConversationHistory,

    /// Which segments listings and "ask all" cover
    pub filter: SegmentFilter,

    /// Persona targeted by single asks
    pub selected: Option<PersonaKey>,

    /// Route plain questions to every filtered persona
    pub ask_all: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            history: ConversationHistory::new(),
            filter: SegmentFilter::All,
            selected: None,
            ask_all: false,
        }
    }

    pub fn with_filter(filter: SegmentFilter) -> Self {
        Self {
            filter,
            ..Self::new()
        }
    }

    pub fn select(&mut self, key: PersonaKey) {
        self.selected = Some(key);
    }

    /// Time since the session started.
    pub fn elapsed(&self) -> Duration {
        Utc::now() - self.started_at
    }

    /// Change the segment filter, dropping a selection that falls outside it.
    pub fn set_filter(&mut self, filter: SegmentFilter) {
        if let Some(ref key) = self.selected {
            if !filter.matches(&key.segment) {
                self.selected = None;
            }
        }
        self.filter = filter;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
