//! Persona store: load the persona document once, then serve read-only
//! lookups and segment filtering.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::registry::{normalize_label, SegmentSummaries};
use super::types::{PersonaEntry, PersonaKey, Segment};

#[cfg(test)]
const INLINE_SOURCE: &str = "<inline>";

// ─────────────────────────────────────────────────────────────────
// Segment filter
// ─────────────────────────────────────────────────────────────────

/// Which personas a listing or an "ask all" covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SegmentFilter {
    #[default]
    All,
    Named(String),
}

impl SegmentFilter {
    pub fn matches(&self, label: &str) -> bool {
        match self {
            SegmentFilter::All => true,
            SegmentFilter::Named(wanted) => wanted == label,
        }
    }
}

impl FromStr for SegmentFilter {
    type Err = std::convert::Infallible;

    /// "all" in any case selects everything; anything else names a segment.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            Ok(SegmentFilter::All)
        } else {
            Ok(SegmentFilter::Named(trimmed.to_string()))
        }
    }
}

impl fmt::Display for SegmentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentFilter::All => write!(f, "All"),
            SegmentFilter::Named(label) => write!(f, "{}", label),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona store
// ─────────────────────────────────────────────────────────────────

/// In-memory, immutable collection of segments.
#[derive(Debug, Clone)]
pub struct PersonaStore {
    source: PathBuf,
    segments: Vec<Segment>,
}

impl PersonaStore {
    /// Load and validate a persona document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading persona source");
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::SourceNotFound {
                path: path.to_path_buf(),
                source: e,
            },
            _ => Error::Io(e),
        })?;

        let store = Self::parse(&content, path)?;
        info!(
            path = %path.display(),
            segments = store.segments.len(),
            personas = store.persona_count(),
            "Persona source loaded"
        );
        Ok(store)
    }

    /// Parse a persona document held in memory.
    #[cfg(test)]
    pub fn from_json(json: &str) -> Result<Self> {
        Self::parse(json, Path::new(INLINE_SOURCE))
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let parse_err = |source| Error::SourceParse {
            path: path.to_path_buf(),
            source,
        };

        let document: Value = serde_json::from_str(content).map_err(parse_err)?;
        let records = match document {
            Value::Array(_) => document,
            Value::Object(mut map) => map.remove("personas").ok_or_else(|| {
                Error::source_invalid("expected a list of segments or an object with a 'personas' list")
            })?,
            _ => {
                return Err(Error::source_invalid(
                    "expected a list of segments or an object with a 'personas' list",
                ))
            }
        };

        let segments: Vec<Segment> = serde_json::from_value(records).map_err(parse_err)?;
        validate_segments(&segments)?;

        Ok(Self {
            source: path.to_path_buf(),
            segments,
        })
    }

    /// Where the records came from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment labels in source order.
    pub fn list_segments(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn segment(&self, label: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.label == label)
    }

    /// Overview for a segment: the record's own summary, else the bundled one.
    pub fn summary(&self, label: &str) -> Option<&str> {
        self.segment(label)
            .and_then(|s| s.summary.as_deref())
            .or_else(|| SegmentSummaries::bundled(label))
    }

    pub fn persona_count(&self) -> usize {
        self.segments.iter().map(Segment::persona_count).sum()
    }

    /// Personas in the filtered segments, in source order (male before female).
    pub fn filter(&self, filter: &SegmentFilter) -> Vec<PersonaEntry<'_>> {
        self.segments
            .iter()
            .filter(|s| filter.matches(&s.label))
            .flat_map(|s| {
                s.personas().map(move |persona| PersonaEntry {
                    persona,
                    segment: s.label.as_str(),
                })
            })
            .collect()
    }

    /// Turn user input into a filter on a known segment.
    ///
    /// Label matching ignores case and dash style; the returned filter always
    /// carries the canonical label from the source.
    pub fn resolve_filter(&self, input: &str) -> Result<SegmentFilter> {
        match input.parse::<SegmentFilter>() {
            Ok(SegmentFilter::All) => Ok(SegmentFilter::All),
            Ok(SegmentFilter::Named(label)) => {
                let wanted = normalize_label(&label);
                self.segments
                    .iter()
                    .find(|s| normalize_label(&s.label) == wanted)
                    .map(|s| SegmentFilter::Named(s.label.clone()))
                    .ok_or(Error::SegmentNotFound { label })
            }
            Err(never) => match never {},
        }
    }

    /// Find a persona by name (case-insensitive), optionally within one segment.
    pub fn find(&self, name: &str, filter: &SegmentFilter) -> Result<PersonaEntry<'_>> {
        let wanted = name.trim();
        let matches: Vec<PersonaEntry<'_>> = self
            .filter(filter)
            .into_iter()
            .filter(|e| e.persona.name.eq_ignore_ascii_case(wanted))
            .collect();

        match matches.len() {
            0 => Err(Error::persona_not_found(wanted)),
            1 => Ok(matches[0]),
            _ => Err(Error::PersonaAmbiguous {
                name: wanted.to_string(),
                segments: matches.iter().map(|e| e.segment.to_string()).collect(),
            }),
        }
    }

    /// Exact lookup by key.
    pub fn get(&self, key: &PersonaKey) -> Option<PersonaEntry<'_>> {
        let segment = self.segment(&key.segment)?;
        segment
            .personas()
            .find(|p| p.name == key.name)
            .map(|persona| PersonaEntry {
                persona,
                segment: segment.label.as_str(),
            })
    }
}

/// Structural rules serde cannot express.
fn validate_segments(segments: &[Segment]) -> Result<()> {
    let mut labels = HashSet::new();

    for (index, segment) in segments.iter().enumerate() {
        if segment.label.trim().is_empty() {
            return Err(Error::source_invalid(format!(
                "segment #{} has an empty label",
                index + 1
            )));
        }
        if !labels.insert(segment.label.as_str()) {
            return Err(Error::source_invalid(format!(
                "duplicate segment label '{}'",
                segment.label
            )));
        }

        let mut names = HashSet::new();
        for persona in segment.personas() {
            if persona.name.trim().is_empty() {
                return Err(Error::source_invalid(format!(
                    "segment '{}' has a persona with an empty name",
                    segment.label
                )));
            }
            if !names.insert(persona.name.as_str()) {
                return Err(Error::source_invalid(format!(
                    "segment '{}' lists '{}' twice",
                    segment.label, persona.name
                )));
            }
        }
    }

    Ok(())
}
