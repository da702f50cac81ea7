// Name resolution: bind free-text subject names in uploads to roster athletes,
// then annotate each row with the athlete's key, age, and age group.

use std::collections::HashMap;

use chrono::NaiveDate;
use reportcard_core::athlete::{AgeGroup, Athlete};
use reportcard_core::config::ResolutionConfig;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use reportcard_core::athlete::normalize_name;

use crate::category::{Category, SliceRule};
use crate::table::{Cell, MeasurementTable, AGE_COLUMN, AGE_GROUP_COLUMN, KEY_COLUMN};

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// A roster name offered for an unrecognized identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub name: String,
    /// Similarity ratio in 0.0..=1.0.
    pub score: f64,
}

/// Outcome of looking one raw identifier up in the roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Match {
    /// Normalized names are equal.
    Exact { name: String },
    /// No exact match; candidates above the similarity floor, best first.
    Suggested { candidates: Vec<Suggestion> },
    /// Nothing close enough.
    NoMatch,
}

/// Similarity of two names after normalization, 0.0..=1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_name(a), &normalize_name(b))
}

/// Roster lookup by normalized name with fuzzy suggestions.
pub struct NameResolver<'a> {
    by_key: HashMap<String, &'a Athlete>,
    athletes: &'a [Athlete],
    similarity_floor: f64,
    max_suggestions: usize,
}

impl<'a> NameResolver<'a> {
    pub fn new(athletes: &'a [Athlete], settings: &ResolutionConfig) -> Self {
        Self {
            by_key: athletes.iter().map(|a| (a.key(), a)).collect(),
            athletes,
            similarity_floor: settings.similarity_floor,
            max_suggestions: settings.max_suggestions,
        }
    }

    /// Roster athlete with exactly this normalized name.
    pub fn athlete(&self, name: &str) -> Option<&'a Athlete> {
        self.by_key.get(&normalize_name(name)).copied()
    }

    pub fn lookup(&self, raw: &str) -> Match {
        if let Some(a) = self.athlete(raw) {
            return Match::Exact { name: a.name.clone() };
        }
        let candidates = self.suggestions(raw);
        if candidates.is_empty() {
            Match::NoMatch
        } else {
            Match::Suggested { candidates }
        }
    }

    /// Up to `max_suggestions` roster names scoring at least the floor, best
    /// first. Ties keep roster order.
    pub fn suggestions(&self, raw: &str) -> Vec<Suggestion> {
        let mut scored: Vec<Suggestion> = self
            .athletes
            .iter()
            .map(|a| Suggestion {
                name: a.name.clone(),
                score: similarity(raw, &a.name),
            })
            .filter(|s| s.score >= self.similarity_floor)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.max_suggestions);
        scored
    }
}

// ---------------------------------------------------------------------------
// Binding policy
// ---------------------------------------------------------------------------

/// An operator's explicit choice for one raw identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Bind to this roster name.
    Bind(String),
    /// Leave unresolved.
    Skip,
}

/// How identifiers without an exact match get bound.
#[derive(Debug, Clone, Default)]
pub struct BindingPolicy {
    /// Keyed by normalized raw identifier. Takes precedence over everything,
    /// including exact matches.
    pub overrides: HashMap<String, Decision>,
    /// Bind the best suggestion when there is no override.
    pub accept_closest: bool,
}

impl BindingPolicy {
    pub fn from_settings(settings: &ResolutionConfig) -> Self {
        Self {
            overrides: HashMap::new(),
            accept_closest: settings.accept_closest,
        }
    }

    pub fn with_override(mut self, raw: &str, decision: Decision) -> Self {
        self.overrides.insert(normalize_name(raw), decision);
        self
    }
}

/// How a raw identifier ended up bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSource {
    Exact,
    Override,
    Closest,
    Unresolved,
}

/// Resolution record for one distinct raw identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameBinding {
    pub raw: String,
    /// Canonical roster name, when bound.
    pub athlete: Option<String>,
    pub source: BindingSource,
    /// Candidates that were considered (empty for exact matches).
    pub suggestions: Vec<Suggestion>,
    /// Rows carrying this identifier.
    pub rows: usize,
}

fn bind(resolver: &NameResolver<'_>, policy: &BindingPolicy, raw: &str) -> NameBinding {
    let unresolved = |suggestions| NameBinding {
        raw: raw.to_string(),
        athlete: None,
        source: BindingSource::Unresolved,
        suggestions,
        rows: 0,
    };

    if let Some(decision) = policy.overrides.get(&normalize_name(raw)) {
        return match decision {
            Decision::Bind(name) => match resolver.athlete(name) {
                Some(a) => NameBinding {
                    raw: raw.to_string(),
                    athlete: Some(a.name.clone()),
                    source: BindingSource::Override,
                    suggestions: Vec::new(),
                    rows: 0,
                },
                None => {
                    warn!("override for '{}' names '{}', who is not on the roster", raw, name);
                    unresolved(resolver.suggestions(raw))
                }
            },
            Decision::Skip => unresolved(Vec::new()),
        };
    }

    match resolver.lookup(raw) {
        Match::Exact { name } => NameBinding {
            raw: raw.to_string(),
            athlete: Some(name),
            source: BindingSource::Exact,
            suggestions: Vec::new(),
            rows: 0,
        },
        Match::Suggested { candidates } if policy.accept_closest => NameBinding {
            raw: raw.to_string(),
            athlete: Some(candidates[0].name.clone()),
            source: BindingSource::Closest,
            suggestions: candidates,
            rows: 0,
        },
        Match::Suggested { candidates } => unresolved(candidates),
        Match::NoMatch => unresolved(Vec::new()),
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// What the join did to one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinReport {
    pub category: Category,
    /// Column the subject names were read from; `None` if the table has none
    /// of the category's candidate columns.
    pub subject_column: Option<String>,
    /// One entry per distinct raw identifier, in first-seen order.
    pub bindings: Vec<NameBinding>,
    /// Rows with no usable subject name.
    pub blank_rows: usize,
}

impl JoinReport {
    /// Identifiers that were not bound to any athlete.
    pub fn unresolved(&self) -> Vec<&NameBinding> {
        self.bindings
            .iter()
            .filter(|b| b.source == BindingSource::Unresolved)
            .collect()
    }

    /// Rows excluded from every athlete's scorecard.
    pub fn unresolved_rows(&self) -> usize {
        self.unresolved().iter().map(|b| b.rows).sum::<usize>() + self.blank_rows
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved_rows() == 0
    }
}

/// First of the category's subject columns present in `table`.
pub fn subject_column(table: &MeasurementTable, category: Category) -> Option<String> {
    category
        .subject_columns()
        .iter()
        .find_map(|c| table.resolve_column(c))
        .map(str::to_string)
}

/// Annotate every row of `table` with `Athlete Key`, `Age`, and `Age Group`.
/// Unbound rows get missing cells. Running the join again replaces the
/// previous annotation.
pub fn join(
    table: &mut MeasurementTable,
    category: Category,
    resolver: &NameResolver<'_>,
    policy: &BindingPolicy,
    as_of: NaiveDate,
) -> JoinReport {
    let subject = subject_column(table, category);
    let mut report = JoinReport {
        category,
        subject_column: subject.clone(),
        bindings: Vec::new(),
        blank_rows: 0,
    };

    let mut by_raw: HashMap<String, usize> = HashMap::new();
    let mut keys = Vec::with_capacity(table.len());
    let mut ages = Vec::with_capacity(table.len());
    let mut groups = Vec::with_capacity(table.len());

    for row in table.rows() {
        let raw = subject
            .as_deref()
            .and_then(|c| row.get(c).as_text())
            .filter(|s| !s.trim().is_empty());
        let athlete = match raw {
            Some(raw) => {
                let idx = *by_raw.entry(normalize_name(&raw)).or_insert_with(|| {
                    report.bindings.push(bind(resolver, policy, &raw));
                    report.bindings.len() - 1
                });
                let binding = &mut report.bindings[idx];
                binding.rows += 1;
                binding.athlete.as_deref().and_then(|n| resolver.athlete(n))
            }
            None => {
                report.blank_rows += 1;
                None
            }
        };

        match athlete {
            Some(a) => {
                let age = a.age_on(as_of);
                keys.push(Cell::Text(a.key()));
                ages.push(age.map_or(Cell::Missing, |n| Cell::Number(n as f64)));
                groups.push(Cell::Text(AgeGroup::from_age(age).label().to_string()));
            }
            None => {
                keys.push(Cell::Missing);
                ages.push(Cell::Missing);
                groups.push(Cell::Missing);
            }
        }
    }

    table.set_column(KEY_COLUMN, keys);
    table.set_column(AGE_COLUMN, ages);
    table.set_column(AGE_GROUP_COLUMN, groups);

    match &subject {
        Some(col) => info!(
            "{}: joined {} rows on '{}' ({} identifiers, {} unresolved rows)",
            category,
            table.len(),
            col,
            report.bindings.len(),
            report.unresolved_rows()
        ),
        None => warn!(
            "{}: no subject column among {:?}; {} rows left unresolved",
            category,
            category.subject_columns(),
            table.len()
        ),
    }
    for b in report.unresolved() {
        debug!("{}: unresolved '{}' ({} rows)", category, b.raw, b.rows);
    }
    report
}

// ---------------------------------------------------------------------------
// Slicing
// ---------------------------------------------------------------------------

/// Rows of a joined table that belong on `athlete`'s scorecard: the athlete's
/// own rows, or the athlete's age-group cohort, per the category's rule.
/// An unknown age group has no cohort.
pub fn slice_for(table: &MeasurementTable, category: Category, athlete: &Athlete, group: AgeGroup) -> MeasurementTable {
    match category.slice_rule() {
        SliceRule::ByName => {
            let key = athlete.key();
            table.filter(|row| row.get(KEY_COLUMN).as_text().as_deref() == Some(key.as_str()))
        }
        SliceRule::ByAgeGroup if group == AgeGroup::Unknown => table.filter(|_| false),
        SliceRule::ByAgeGroup => {
            let label = group.label();
            table.filter(|row| row.get(AGE_GROUP_COLUMN).as_text().as_deref() == Some(label))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn roster() -> Vec<Athlete> {
        vec![
            Athlete::new("Jake Diaz", Some(date(2009, 6, 1))),
            Athlete::new("O'Brien-J", Some(date(2011, 1, 15))),
            Athlete::new("Luis Ortega", Some(date(2006, 3, 3))),
            Athlete::new("No Dob", None),
        ]
    }

    fn settings() -> ResolutionConfig {
        ResolutionConfig::default()
    }

    // -- matching --

    #[test]
    fn exact_match_ignores_dash_case_and_padding() {
        let r = roster();
        let resolver = NameResolver::new(&r, &settings());
        assert_eq!(
            resolver.lookup("o'brien\u{2013}J "),
            Match::Exact { name: "O'Brien-J".into() }
        );
        assert_eq!(
            resolver.lookup("O'Brien\u{2014}J"),
            Match::Exact { name: "O'Brien-J".into() }
        );
    }

    #[test]
    fn suggestions_respect_floor_and_limit() {
        let r = roster();
        let resolver = NameResolver::new(&r, &settings());
        match resolver.lookup("Jake Dias") {
            Match::Suggested { candidates } => {
                assert_eq!(candidates[0].name, "Jake Diaz");
                assert!(candidates.len() <= 3);
                assert!(candidates.iter().all(|s| s.score >= 0.6));
            }
            other => panic!("expected suggestions, got {other:?}"),
        }
        assert_eq!(resolver.lookup("Zzzzzzzzz"), Match::NoMatch);
    }

    #[test]
    fn suggestions_sorted_best_first() {
        let r = vec![
            Athlete::new("Jake Diaz", None),
            Athlete::new("Jake Dian", None),
            Athlete::new("Jane Diaz", None),
            Athlete::new("Jake Diazz", None),
        ];
        let cfg = ResolutionConfig {
            max_suggestions: 2,
            ..settings()
        };
        let resolver = NameResolver::new(&r, &cfg);
        let s = resolver.suggestions("jake diazzz");
        assert_eq!(s.len(), 2);
        assert!(s[0].score > s[1].score);
        assert_eq!(s[0].name, "Jake Diazz");
        assert_eq!(s[1].name, "Jake Diaz");
    }

    // -- join --

    #[test]
    fn join_appends_columns_and_reports_unresolved() {
        let r = roster();
        let resolver = NameResolver::new(&r, &settings());
        let policy = BindingPolicy::default();
        let mut table = MeasurementTable::from_records(
            &["Player Name", "Pulldown Velocity"],
            &[
                vec!["Jake Diaz", "70"],
                vec!["O'Brien\u{2014}J", "60"],
                vec!["Jake Dias", "71"],
                vec!["", "50"],
                vec!["Nobody At All", "40"],
            ],
        );

        let report = join(&mut table, Category::Throwing, &resolver, &policy, date(2024, 6, 2));
        assert_eq!(report.subject_column.as_deref(), Some("Player Name"));
        assert_eq!(report.bindings.len(), 4);
        assert_eq!(report.blank_rows, 1);

        let unresolved: Vec<&str> = report.unresolved().iter().map(|b| b.raw.as_str()).collect();
        assert_eq!(unresolved, vec!["Jake Dias", "Nobody At All"]);
        assert_eq!(report.unresolved_rows(), 3);
        // The near miss still carries suggestions for the operator.
        assert_eq!(report.bindings[2].suggestions[0].name, "Jake Diaz");

        let rows = table.rows();
        assert_eq!(rows[0].get(KEY_COLUMN), &Cell::Text("jake diaz".into()));
        assert_eq!(rows[0].get(AGE_COLUMN), &Cell::Number(15.0));
        assert_eq!(rows[0].get(AGE_GROUP_COLUMN), &Cell::Text("jv (14\u{2013}15)".into()));
        assert_eq!(rows[1].get(KEY_COLUMN), &Cell::Text("o'brien-j".into()));
        assert!(rows[2].get(KEY_COLUMN).is_missing());
        assert!(rows[3].get(AGE_COLUMN).is_missing());
    }

    #[test]
    fn dash_variants_join_to_same_athlete() {
        let r = roster();
        let resolver = NameResolver::new(&r, &settings());
        let mut table = MeasurementTable::from_records(
            &["Name", "Ankle Mobility"],
            &[vec!["O'Brien\u{2014}J", "3"], vec!["O'Brien-J", "4"]],
        );
        let report = join(&mut table, Category::Mobility, &resolver, &BindingPolicy::default(), date(2024, 6, 2));
        assert_eq!(report.bindings.len(), 1);
        assert_eq!(report.bindings[0].rows, 2);
        assert!(report.is_fully_resolved());
        assert_eq!(table.rows()[0].get(KEY_COLUMN), table.rows()[1].get(KEY_COLUMN));
    }

    #[test]
    fn accept_closest_and_overrides() {
        let r = roster();
        let resolver = NameResolver::new(&r, &settings());
        let records = [vec!["Jake Dias", "70"], vec!["Luis Ortega", "65"]];
        let as_of = date(2024, 6, 2);

        let mut table = MeasurementTable::from_records(&["Name", "FB Velocity"], &records);
        let closest = BindingPolicy {
            accept_closest: true,
            ..Default::default()
        };
        let report = join(&mut table, Category::Throwing, &resolver, &closest, as_of);
        assert_eq!(report.bindings[0].source, BindingSource::Closest);
        assert_eq!(report.bindings[0].athlete.as_deref(), Some("Jake Diaz"));

        let mut table = MeasurementTable::from_records(&["Name", "FB Velocity"], &records);
        let overridden = BindingPolicy::default()
            .with_override("jake dias", Decision::Bind("Luis Ortega".into()))
            .with_override("Luis Ortega", Decision::Skip);
        let report = join(&mut table, Category::Throwing, &resolver, &overridden, as_of);
        assert_eq!(report.bindings[0].source, BindingSource::Override);
        assert_eq!(report.bindings[0].athlete.as_deref(), Some("Luis Ortega"));
        assert_eq!(report.bindings[1].source, BindingSource::Unresolved);
    }

    #[test]
    fn join_is_idempotent() {
        let r = roster();
        let resolver = NameResolver::new(&r, &settings());
        let policy = BindingPolicy::default();
        let mut table = MeasurementTable::from_records(&["Batter", "Exit_Speed"], &[vec!["Jake Diaz", "88"]]);
        join(&mut table, Category::Flightscope, &resolver, &policy, date(2024, 6, 2));
        let once = table.clone();
        join(&mut table, Category::Flightscope, &resolver, &policy, date(2024, 6, 2));
        assert_eq!(table, once);
        assert_eq!(table.columns().len(), 5);
    }

    #[test]
    fn missing_subject_column_leaves_rows_unresolved() {
        let r = roster();
        let resolver = NameResolver::new(&r, &settings());
        let mut table = MeasurementTable::from_records(&["Who", "Plane Score"], &[vec!["Jake Diaz", "60"]]);
        let report = join(&mut table, Category::Blast, &resolver, &BindingPolicy::default(), date(2024, 6, 2));
        assert_eq!(report.subject_column, None);
        assert_eq!(report.unresolved_rows(), 1);
        assert!(table.rows()[0].get(KEY_COLUMN).is_missing());
    }

    #[test]
    fn athlete_without_dob_has_unknown_group() {
        let r = roster();
        let resolver = NameResolver::new(&r, &settings());
        let mut table = MeasurementTable::from_records(&["Name", "Plane Score"], &[vec!["No Dob", "60"]]);
        join(&mut table, Category::Blast, &resolver, &BindingPolicy::default(), date(2024, 6, 2));
        assert_eq!(table.rows()[0].get(AGE_GROUP_COLUMN), &Cell::Text("unknown".into()));
        assert!(table.rows()[0].get(AGE_COLUMN).is_missing());
    }

    // -- slicing --

    #[test]
    fn slice_by_name_and_by_group() {
        let r = roster();
        let resolver = NameResolver::new(&r, &settings());
        let as_of = date(2024, 6, 2);
        let policy = BindingPolicy::default();

        let mut blast = MeasurementTable::from_records(
            &["Name", "Plane Score"],
            &[vec!["Jake Diaz", "60"], vec!["O'Brien-J", "50"], vec!["Luis Ortega", "70"]],
        );
        join(&mut blast, Category::Blast, &resolver, &policy, as_of);

        let jake = &r[0];
        let cohort = slice_for(&blast, Category::Blast, jake, jake.age_group_on(as_of));
        assert_eq!(cohort.len(), 1);

        let mut throws = MeasurementTable::from_records(
            &["Name", "FB Velocity"],
            &[vec!["Jake Diaz", "60"], vec!["Luis Ortega", "70"], vec!["jake diaz", "62"]],
        );
        join(&mut throws, Category::Throwing, &resolver, &policy, as_of);
        let own = slice_for(&throws, Category::Throwing, jake, jake.age_group_on(as_of));
        assert_eq!(own.numeric_values("FB Velocity"), vec![60.0, 62.0]);

        let nodob = &r[3];
        assert!(slice_for(&blast, Category::Blast, nodob, AgeGroup::Unknown).is_empty());
    }
}
