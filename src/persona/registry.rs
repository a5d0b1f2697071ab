//! Bundled segment summaries.
//!
//! The five standard investor segments ship with a short overview blurb so a
//! persona file does not have to carry one. A `summary` on the segment record
//! always wins over the bundled text.

/// Built-in segment overviews keyed by segment label.
pub struct SegmentSummaries;

const BUNDLED: &[(&str, &str)] = &[
    (
        "Next Generation Investors (18–24 years)",
        "These young investors are tech-savvy, socially conscious, and ambitious.",
    ),
    (
        "Emerging Wealth Builders (25–34 years)",
        "These individuals are in the early stages of wealth accumulation.",
    ),
    (
        "Established Accumulators (35–49 years)",
        "Often juggling career and family, these investors focus on financial security.",
    ),
    (
        "Pre-Retirees (50–64 years)",
        "Pre-retirees are focused on preserving wealth and planning for a secure retirement.",
    ),
    (
        "Retirees (65+ years)",
        "This segment prioritises stability, simplicity, and preserving capital.",
    ),
];

impl SegmentSummaries {
    /// Bundled summary for a label.
    ///
    /// Matching ignores case and treats the various dash characters
    /// (hyphen, non-breaking hyphen, en dash) as equal.
    pub fn bundled(label: &str) -> Option<&'static str> {
        let wanted = normalize_label(label);
        BUNDLED
            .iter()
            .find(|(known, _)| normalize_label(known) == wanted)
            .map(|(_, summary)| *summary)
    }
}

/// Fold case and dash style so hand-typed labels compare equal.
pub(crate) fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}
