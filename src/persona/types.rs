//! Core types for persona records.
//!
//! Mirrors the JSON document layout: a list of segment records, each holding
//! up to one male and one female persona. Optional fields carry explicit
//! serde defaults so that nothing is looked up dynamically later.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────
// Persona
// ─────────────────────────────────────────────────────────────────

/// A static synthetic investor profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Display name, unique within its segment.
    pub name: String,

    pub age: u32,

    pub location: String,

    pub occupation: String,

    /// Annual income in whole dollars. Absent renders as "n/a".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<u64>,

    /// Stated values, in source order. Default: empty.
    #[serde(default)]
    pub values: Vec<String>,

    /// Financial goals, in source order. Default: empty.
    #[serde(default)]
    pub goals: Vec<String>,

    /// Behavioural traits such as `risk_tolerance`. Default: empty.
    #[serde(default, alias = "behavioral_traits")]
    pub behavioural_traits: BTreeMap<String, Value>,

    /// Image URL or path shown next to the persona. Default: none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Suggested questions offered to the user. Default: empty.
    #[serde(default)]
    pub suggestions: Vec<String>,

    /// Free-text background story. Default: none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl Persona {
    /// Look up a behavioural trait and render it as plain text.
    pub fn trait_text(&self, key: &str) -> Option<String> {
        self.behavioural_traits.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// The `risk_tolerance` trait, shown on the profile card.
    pub fn risk_tolerance(&self) -> Option<String> {
        self.trait_text("risk_tolerance")
    }
}

// ─────────────────────────────────────────────────────────────────
// Gender slot
// ─────────────────────────────────────────────────────────────────

/// Which slot of a segment record a persona came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Slots in the order they are listed.
    pub fn all() -> &'static [Gender] {
        &[Gender::Male, Gender::Female]
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Segment
// ─────────────────────────────────────────────────────────────────

/// A named investor cohort with up to two personas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Cohort label, e.g. "Retirees (65+ years)".
    #[serde(rename = "segment")]
    pub label: String,

    /// Overview blurb. Falls back to the built-in summary table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub male: Option<Persona>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub female: Option<Persona>,
}

impl Segment {
    pub fn persona(&self, gender: Gender) -> Option<&Persona> {
        match gender {
            Gender::Male => self.male.as_ref(),
            Gender::Female => self.female.as_ref(),
        }
    }

    /// Present personas, male first.
    pub fn personas(&self) -> impl Iterator<Item = &Persona> {
        Gender::all().iter().filter_map(move |g| self.persona(*g))
    }

    pub fn persona_count(&self) -> usize {
        self.personas().count()
    }
}

// ─────────────────────────────────────────────────────────────────
// Keys and entries
// ─────────────────────────────────────────────────────────────────

/// Identity of a persona across the whole store: segment plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonaKey {
    pub segment: String,
    pub name: String,
}

impl PersonaKey {
    pub fn new(segment: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PersonaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.segment)
    }
}

/// A persona paired with the segment it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct PersonaEntry<'a> {
    pub persona: &'a Persona,
    pub segment: &'a str,
}

impl<'a> PersonaEntry<'a> {
    pub fn key(&self) -> PersonaKey {
        PersonaKey::new(self.segment, &self.persona.name)
    }
}
