// Scorecard assembly: one athlete, one assessment date, every uploaded
// category reduced to classified metric entries.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use reportcard_core::athlete::{AgeGroup, Athlete};
use reportcard_core::config::ResolutionConfig;
use reportcard_core::notes::{latest_note, ScoutNote, NO_NOTES_PLACEHOLDER};
use serde::Serialize;
use tracing::{info, warn};

use crate::category::Category;
use crate::classify::{classify, Tier};
use crate::extract::{ball_flight_points, extract, force_plate, FlightPoint, ForcePlateRow, MetricSummary};
use crate::resolve::{join, slice_for, BindingPolicy, JoinReport, NameResolver};
use crate::table::MeasurementTable;
use crate::thresholds::{Cut, ThresholdTable};

// ---------------------------------------------------------------------------
// Context and inputs
// ---------------------------------------------------------------------------

/// Everything a report needs besides the uploads themselves.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub roster: Vec<Athlete>,
    pub thresholds: ThresholdTable,
    pub notes: Vec<ScoutNote>,
    pub resolution: ResolutionConfig,
    pub note_placeholder: String,
}

impl AppContext {
    pub fn new(roster: Vec<Athlete>, thresholds: ThresholdTable, notes: Vec<ScoutNote>) -> Self {
        Self {
            roster,
            thresholds,
            notes,
            resolution: ResolutionConfig::default(),
            note_placeholder: NO_NOTES_PLACEHOLDER.to_string(),
        }
    }

    pub fn resolver(&self) -> NameResolver<'_> {
        NameResolver::new(&self.roster, &self.resolution)
    }

    /// Join every raw upload against the roster as of `as_of`. Later uploads
    /// of the same category replace earlier ones.
    pub fn join_uploads(
        &self,
        raw: Vec<(Category, MeasurementTable)>,
        as_of: NaiveDate,
        policy: &BindingPolicy,
    ) -> (Uploads, Vec<JoinReport>) {
        let resolver = self.resolver();
        let mut uploads = Uploads::new();
        let mut reports = Vec::with_capacity(raw.len());
        for (category, mut table) in raw {
            reports.push(join(&mut table, category, &resolver, policy, as_of));
            uploads.insert(category, table);
        }
        (uploads, reports)
    }
}

/// Joined measurement tables, at most one per category.
#[derive(Debug, Clone, Default)]
pub struct Uploads {
    tables: BTreeMap<Category, MeasurementTable>,
}

impl Uploads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: Category, table: MeasurementTable) {
        self.tables.insert(category, table);
    }

    pub fn get(&self, category: Category) -> Option<&MeasurementTable> {
        self.tables.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &MeasurementTable)> {
        self.tables.iter().map(|(c, t)| (*c, t))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ScorecardError {
    #[error("athlete '{name}' is not on the roster")]
    UnknownAthlete { name: String },
}

/// Static profile block at the top of a scorecard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub name: String,
    pub dob: Option<NaiveDate>,
    pub age: Option<i32>,
    pub age_group: AgeGroup,
    pub class: String,
    pub school: String,
    pub position: Option<String>,
    pub height: Option<u32>,
    pub weight: Option<u32>,
    pub bats_throws: String,
}

impl Profile {
    fn new(athlete: &Athlete, as_of: NaiveDate) -> Self {
        Self {
            name: athlete.name.clone(),
            dob: athlete.dob,
            age: athlete.age_on(as_of),
            age_group: athlete.age_group_on(as_of),
            class: athlete.class.clone(),
            school: athlete.school.clone(),
            position: athlete.position.map(|p| p.display_str().to_string()),
            height: athlete.height,
            weight: athlete.weight,
            bats_throws: athlete.bats_throws(),
        }
    }
}

/// One metric row on the scorecard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorecardEntry {
    pub metric: String,
    /// Category the value came from; `None` when nothing was measured.
    pub category: Option<Category>,
    pub value: Option<f64>,
    pub tier: Tier,
    pub color: &'static str,
    pub threshold: Option<Cut>,
    /// (low, high) for plotting: the threshold's below/above cuts when one
    /// exists, else the observed min and max. Always low <= high, whatever
    /// the metric's direction.
    pub display_range: Option<(f64, f64)>,
    /// Observed max minus min, when more than one distinct value was seen.
    pub spread: Option<f64>,
    pub samples: usize,
}

impl ScorecardEntry {
    /// Value with `precision` decimals, or `N/A`.
    pub fn value_display(&self, precision: usize) -> String {
        match self.value {
            Some(v) => format!("{v:.precision$}"),
            None => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub profile: Profile,
    pub assessment_date: NaiveDate,
    /// Threshold metrics for the athlete's age group in table order, then any
    /// measured metrics without a threshold.
    pub entries: Vec<ScorecardEntry>,
    pub force_plate: Vec<ForcePlateRow>,
    pub flight_points: Vec<FlightPoint>,
    pub latest_note: String,
    /// Problems the reader should see (missing columns and the like).
    pub notices: Vec<String>,
}

impl Scorecard {
    pub fn entry(&self, metric: &str) -> Option<&ScorecardEntry> {
        self.entries.iter().find(|e| e.metric == metric)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

struct Measured {
    category: Category,
    summary: MetricSummary,
}

/// Build the scorecard for `athlete_name` as of `assessment_date`.
///
/// Fails only when the athlete is not on the roster. Missing categories and
/// unmeasured metrics show up as `N/A` entries; a batted-ball upload with no
/// exit-speed column adds a notice.
pub fn assemble(
    ctx: &AppContext,
    athlete_name: &str,
    assessment_date: NaiveDate,
    uploads: &Uploads,
) -> Result<Scorecard, ScorecardError> {
    let resolver = ctx.resolver();
    let athlete = resolver
        .athlete(athlete_name)
        .ok_or_else(|| ScorecardError::UnknownAthlete {
            name: athlete_name.to_string(),
        })?;
    let group = athlete.age_group_on(assessment_date);

    let mut measured: BTreeMap<String, Measured> = BTreeMap::new();
    let mut extra_order: Vec<String> = Vec::new();
    let mut notices = Vec::new();
    let mut force_rows = Vec::new();
    let mut flight_points = Vec::new();

    for (category, table) in uploads.iter() {
        let slice = slice_for(table, category, athlete, group);
        let extraction = extract(category, &slice);
        notices.extend(extraction.issues.iter().map(|e| e.to_string()));

        for (metric, summary) in extraction.metrics {
            if measured.contains_key(&metric) {
                warn!("{}: metric '{}' already measured by another category", category, metric);
                continue;
            }
            extra_order.push(metric.clone());
            measured.insert(metric, Measured { category, summary });
        }

        match category {
            Category::Flightscope => flight_points = ball_flight_points(&slice),
            Category::Dynamo => force_rows = force_plate(&slice),
            _ => {}
        }
    }

    let mut entries = Vec::new();
    for (metric, cut) in ctx.thresholds.metrics(group) {
        entries.push(entry(ctx, metric, Some(*cut), measured.remove(metric), group));
    }
    for metric in extra_order {
        if let Some(m) = measured.remove(&metric) {
            entries.push(entry(ctx, &metric, None, Some(m), group));
        }
    }

    let latest_note = latest_note(&ctx.notes, &athlete.name)
        .map(|n| n.text.clone())
        .unwrap_or_else(|| ctx.note_placeholder.clone());

    info!(
        "assembled scorecard for {} ({}): {} entries, {} measured",
        athlete.name,
        group,
        entries.len(),
        entries.iter().filter(|e| e.value.is_some()).count()
    );

    Ok(Scorecard {
        profile: Profile::new(athlete, assessment_date),
        assessment_date,
        entries,
        force_plate: force_rows,
        flight_points,
        latest_note,
        notices,
    })
}

fn entry(ctx: &AppContext, metric: &str, threshold: Option<Cut>, m: Option<Measured>, group: AgeGroup) -> ScorecardEntry {
    let value = m.as_ref().map(|m| m.summary.mean);
    let tier = classify(&ctx.thresholds, metric, value, group);
    let observed = m.as_ref().map(|m| (m.summary.min, m.summary.max));
    ScorecardEntry {
        metric: metric.to_string(),
        category: m.as_ref().map(|m| m.category),
        value,
        tier,
        color: tier.color(),
        threshold,
        display_range: threshold
            .map(|c| (c.below_avg.min(c.above_avg), c.below_avg.max(c.above_avg)))
            .or(observed),
        spread: m
            .as_ref()
            .map(|m| m.summary.spread())
            .filter(|s| *s > 0.0),
        samples: m.as_ref().map_or(0, |m| m.summary.count),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
