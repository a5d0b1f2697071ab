//! Per-persona question/answer history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persona::PersonaKey;

/// One completed round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl Exchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        }
    }
}

/// Session-scoped history keyed by persona.
///
/// Iteration follows the order in which personas were first answered.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    exchanges: HashMap<PersonaKey, Vec<Exchange>>,
    order: Vec<PersonaKey>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, key: PersonaKey, exchange: Exchange) {
        if !self.exchanges.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.exchanges.entry(key).or_default().push(exchange);
    }

    /// Full history for one persona, oldest first.
    pub fn for_persona(&self, key: &PersonaKey) -> &[Exchange] {
        self.exchanges.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// (persona, exchanges) in first-answered order.
    pub fn iter(&self) -> impl Iterator<Item = (&PersonaKey, &[Exchange])> {
        self.order
            .iter()
            .map(move |key| (key, self.for_persona(key)))
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn persona_count(&self) -> usize {
        self.order.len()
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.values().map(Vec::len).sum()
    }
}
