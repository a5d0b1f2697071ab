//! Plain-text rendering for the terminal front end.
//!
//! Everything here returns a String so output can be asserted in tests;
//! callers decide whether it goes to stdout.

use std::fmt;

use crate::conversation::{AskAllReport, ConversationHistory};
use crate::persona::{PersonaEntry, PersonaStore};

const NOT_AVAILABLE: &str = "n/a";

/// Dollar amount with thousands separators, e.g. `$85,000`.
pub fn format_income(income: Option<u64>) -> String {
    let Some(amount) = income else {
        return NOT_AVAILABLE.to_string();
    };

    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("${}", grouped)
}

/// Segment labels with their overview text.
pub fn segment_list(store: &PersonaStore) -> String {
    SegmentList(store).to_string()
}

struct SegmentList<'a>(&'a PersonaStore);

impl fmt::Display for SegmentList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.0;
        for segment in store.segments() {
            writeln!(f, "{} ({} personas)", segment.label, segment.persona_count())?;
            if let Some(summary) = store.summary(&segment.label) {
                writeln!(f, "    {}", summary)?;
            }
        }
        Ok(())
    }
}

/// One row per persona: name, segment, location, age.
pub fn persona_grid(entries: &[PersonaEntry<'_>]) -> String {
    if entries.is_empty() {
        return "No personas match this segment.\n".to_string();
    }
    PersonaGrid(entries).to_string()
}

struct PersonaGrid<'a, 'p>(&'a [PersonaEntry<'p>]);

impl fmt::Display for PersonaGrid<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.0;
        let name_w = column_width("Name", entries.iter().map(|e| e.persona.name.as_str()));
        let segment_w = column_width("Segment", entries.iter().map(|e| e.segment));
        let location_w = column_width("Location", entries.iter().map(|e| e.persona.location.as_str()));

        writeln!(
            f,
            "{:<name_w$}  {:<segment_w$}  {:<location_w$}  Age",
            "Name", "Segment", "Location"
        )?;
        for entry in entries {
            writeln!(
                f,
                "{:<name_w$}  {:<segment_w$}  {:<location_w$}  {}",
                entry.persona.name, entry.segment, entry.persona.location, entry.persona.age
            )?;
        }
        Ok(())
    }
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|v| v.chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0)
}

/// Full profile card for one persona.
pub fn profile_card(entry: PersonaEntry<'_>) -> String {
    ProfileCard(entry).to_string()
}

struct ProfileCard<'a>(PersonaEntry<'a>);

impl fmt::Display for ProfileCard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.0.persona;

        writeln!(f, "{} ({})", p.name, self.0.segment)?;
        writeln!(f, "  Age:            {}", p.age)?;
        writeln!(f, "  Location:       {}", p.location)?;
        writeln!(f, "  Occupation:     {}", p.occupation)?;
        writeln!(f, "  Income:         {}", format_income(p.income))?;
        writeln!(
            f,
            "  Risk Tolerance: {}",
            p.risk_tolerance().unwrap_or_else(|| NOT_AVAILABLE.to_string())
        )?;

        writeln!(f, "  Goals:")?;
        for goal in &p.goals {
            writeln!(f, "    • {}", goal)?;
        }
        writeln!(f, "  Values:         {}", p.values.join(", "))?;

        if let Some(ref image) = p.image {
            writeln!(f, "  Image:          {}", image)?;
        }
        if let Some(ref narrative) = p.narrative {
            writeln!(f)?;
            writeln!(f, "  {}", narrative)?;
        }

        writeln!(f)?;
        writeln!(f, "Suggested Questions")?;
        if p.suggestions.is_empty() {
            writeln!(f, "  No suggestions for this persona.")?;
        } else {
            for (i, suggestion) in p.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }
        Ok(())
    }
}

/// One answer, prefixed by the speaker.
pub fn answer(name: &str, text: &str) -> String {
    format!("{}: {}\n", name, text)
}

/// Per-persona results of an "ask all".
pub fn ask_all_report(report: &AskAllReport) -> String {
    AskAllSummary(report).to_string()
}

struct AskAllSummary<'a>(&'a AskAllReport);

impl fmt::Display for AskAllSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        for outcome in &report.outcomes {
            match outcome.result {
                Ok(ref text) => write!(f, "{}", answer(&outcome.persona.name, text))?,
                Err(ref e) => writeln!(f, "{}: [failed] {}", outcome.persona.name, e)?,
            }
        }
        for key in &report.skipped {
            writeln!(f, "{}: [skipped]", key.name)?;
        }
        if !report.all_succeeded() {
            writeln!(
                f,
                "\n{} answered, {} failed, {} skipped",
                report.succeeded(),
                report.failed(),
                report.skipped.len()
            )?;
        }
        Ok(())
    }
}

/// Every exchange grouped by persona, in first-answered order.
pub fn transcript(history: &ConversationHistory) -> String {
    if history.is_empty() {
        return "No conversation yet.\n".to_string();
    }
    Transcript(history).to_string()
}

struct Transcript<'a>(&'a ConversationHistory);

impl fmt::Display for Transcript<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, exchanges) in self.0.iter() {
            writeln!(f, "#### {}", key)?;
            for exchange in exchanges {
                writeln!(f, "You: {}", exchange.question)?;
                writeln!(f, "{}: {}", key.name, exchange.answer)?;
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::engine::AskOutcome;
    use crate::conversation::history::Exchange;
    use crate::error::Error;
    use crate::persona::{PersonaKey, SegmentFilter};

    const PERSONAS: &str = r#"[
        {"segment": "Pre-Retirees (50–64 years)",
         "male": {"name": "David", "age": 58, "location": "Perth", "occupation": "Engineer",
                  "income": 145000, "values": ["security", "family"],
                  "goals": ["Retire at 62", "Pay off mortgage"],
                  "behavioural_traits": {"risk_tolerance": "Moderate"},
                  "suggestions": ["How much super is enough?"]},
         "female": {"name": "Linda", "age": 55, "location": "Darwin", "occupation": "Accountant"}}
    ]"#;

    fn store() -> PersonaStore {
        PersonaStore::from_json(PERSONAS).unwrap()
    }

    #[test]
    fn test_format_income() {
        assert_eq!(format_income(Some(85000)), "$85,000");
        assert_eq!(format_income(Some(1_234_567)), "$1,234,567");
        assert_eq!(format_income(Some(999)), "$999");
        assert_eq!(format_income(Some(0)), "$0");
        assert_eq!(format_income(None), "n/a");
    }

    #[test]
    fn test_profile_card() {
        let store = store();
        let card = profile_card(store.find("David", &SegmentFilter::All).unwrap());

        assert!(card.starts_with("David (Pre-Retirees (50–64 years))"));
        assert!(card.contains("Income:         $145,000"));
        assert!(card.contains("Risk Tolerance: Moderate"));
        assert!(card.contains("• Retire at 62"));
        assert!(card.contains("Values:         security, family"));
        assert!(card.contains("1. How much super is enough?"));
    }

    #[test]
    fn test_profile_card_without_suggestions() {
        let store = store();
        let card = profile_card(store.find("Linda", &SegmentFilter::All).unwrap());
        assert!(card.contains("Income:         n/a"));
        assert!(card.contains("No suggestions for this persona."));
    }

    #[test]
    fn test_persona_grid() {
        let store = store();
        let grid = persona_grid(&store.filter(&SegmentFilter::All));
        let lines: Vec<&str> = grid.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Name"));
        assert!(lines[1].starts_with("David"));
        assert!(lines[1].ends_with("58"));
        assert!(lines[2].contains("Darwin"));
        assert!(persona_grid(&[]).contains("No personas"));
    }

    #[test]
    fn test_segment_list_uses_bundled_summary() {
        let out = segment_list(&store());
        assert!(out.contains("Pre-Retirees (50–64 years) (2 personas)"));
        assert!(out.contains("preserving wealth"));
    }

    #[test]
    fn test_transcript() {
        let mut history = ConversationHistory::new();
        assert_eq!(transcript(&history), "No conversation yet.\n");

        let key = PersonaKey::new("Retirees", "Sam");
        history.append(key, Exchange::new("Any tips?", "Keep it simple."));
        let out = transcript(&history);
        assert!(out.contains("#### Sam (Retirees)"));
        assert!(out.contains("You: Any tips?"));
        assert!(out.contains("Sam: Keep it simple."));
    }

    #[test]
    fn test_ask_all_report() {
        let report = AskAllReport {
            outcomes: vec![
                AskOutcome {
                    persona: PersonaKey::new("A", "Liam"),
                    result: Ok("Yes.".to_string()),
                },
                AskOutcome {
                    persona: PersonaKey::new("A", "Zoe"),
                    result: Err(Error::UpstreamQuota {
                        message: "slow down".to_string(),
                    }),
                },
            ],
            skipped: vec![PersonaKey::new("B", "Jordan")],
        };

        let out = ask_all_report(&report);
        assert!(out.contains("Liam: Yes."));
        assert!(out.contains("Zoe: [failed] Quota exceeded: slow down"));
        assert!(out.contains("Jordan: [skipped]"));
        assert!(out.contains("1 answered, 1 failed, 1 skipped"));
    }
}
