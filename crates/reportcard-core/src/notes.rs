// Scout notes: dated free text attached to an athlete.

use chrono::NaiveDate;
use serde::Serialize;

use crate::athlete::normalize_name;

/// Shown on a report when the athlete has no notes.
pub const NO_NOTES_PLACEHOLDER: &str = "No scout notes available.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoutNote {
    /// Database row id; 0 for notes not yet stored.
    pub id: i64,
    pub athlete: String,
    pub date: NaiveDate,
    pub text: String,
}

/// The most recent note for `athlete` (by date; among notes on the same
/// date, the one stored last).
pub fn latest_note<'a>(notes: &'a [ScoutNote], athlete: &str) -> Option<&'a ScoutNote> {
    let key = normalize_name(athlete);
    notes
        .iter()
        .filter(|n| normalize_name(&n.athlete) == key)
        .max_by_key(|n| (n.date, n.id))
}

/// Notes for `athlete`, newest first.
pub fn notes_for<'a>(notes: &'a [ScoutNote], athlete: &str) -> Vec<&'a ScoutNote> {
    let key = normalize_name(athlete);
    let mut out: Vec<&ScoutNote> = notes
        .iter()
        .filter(|n| normalize_name(&n.athlete) == key)
        .collect();
    out.sort_by(|a, b| (b.date, b.id).cmp(&(a.date, a.id)));
    out
}
