// Metric extractors: turn a measurement table into per-metric summaries.
//
// Extractors never fail on bad cells. Unparseable values are dropped from the
// aggregate, and a metric whose column holds no numbers is left out of the
// output entirely. The one condition reported back to the caller is a missing
// exit-speed column on batted-ball data.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::category::Category;
use crate::table::{Cell, MeasurementTable, JOIN_COLUMNS};

/// Swing-sensor columns that become metrics, by canonical label. Matching is
/// exact and case-insensitive; any other swing column is ignored.
pub const BAT_SWING_METRICS: [&str; 13] = [
    "Plane Score",
    "Connection Score",
    "Rotation Score",
    "Bat Speed (mph)",
    "Rotational Acceleration (g)",
    "On Plane Efficiency (%)",
    "Attack Angle (deg)",
    "Early Connection (deg)",
    "Connection at Impact (deg)",
    "Vertical Bat Angle (deg)",
    "Power (kW)",
    "Time to Contact (sec)",
    "Peak Hand Speed (mph)",
];

pub const MAX_EV_METRIC: &str = "Max EV (mph)";
pub const P90_EV_METRIC: &str = "90th % EV (mph)";

const THROWING_TOKENS: [&str; 1] = ["velocity"];
const RUNNING_TOKENS: [&str; 3] = ["30yd", "60yd", "shuttle"];
const MOBILITY_TOKENS: [&str; 1] = ["mobility"];

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Aggregate of one metric over the numeric cells of a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl MetricSummary {
    /// `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        Some(Self {
            mean: values.iter().sum::<f64>() / n,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            count: values.len(),
        })
    }

    /// Observed max minus min.
    pub fn spread(&self) -> f64 {
        self.max - self.min
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("{category} data has no {requirement} column")]
    MissingColumn {
        category: Category,
        requirement: String,
    },
}

/// Output of one extractor run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub category: Category,
    pub metrics: BTreeMap<String, MetricSummary>,
    /// Input columns that fed a metric (or, for batted-ball and force-plate
    /// data, a derived result).
    pub claimed: Vec<String>,
    /// Data columns no rule claimed. Subject and join columns are excluded.
    pub unclaimed: Vec<String>,
    /// Boundary-level problems the caller should surface to the user.
    #[serde(skip)]
    pub issues: Vec<ExtractError>,
}

impl Extraction {
    fn new(category: Category) -> Self {
        Self {
            category,
            metrics: BTreeMap::new(),
            claimed: Vec::new(),
            unclaimed: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn get(&self, metric: &str) -> Option<&MetricSummary> {
        self.metrics.get(metric)
    }

    pub fn mean(&self, metric: &str) -> Option<f64> {
        self.get(metric).map(|s| s.mean)
    }

    /// Record the columns of `table` that nothing claimed.
    fn finish(mut self, table: &MeasurementTable) -> Self {
        let subject = self.category.subject_columns();
        self.unclaimed = table
            .columns()
            .iter()
            .filter(|c| !self.claimed.contains(*c))
            .filter(|c| !JOIN_COLUMNS.contains(&c.as_str()) && !subject.contains(&c.as_str()))
            .cloned()
            .collect();
        if !self.unclaimed.is_empty() {
            debug!("{}: unclaimed columns {:?}", self.category, self.unclaimed);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Column extractors
// ---------------------------------------------------------------------------

/// Run the extractor for `category`.
pub fn extract(category: Category, table: &MeasurementTable) -> Extraction {
    match category {
        Category::Blast => bat_swing(table),
        Category::Flightscope => batted_ball(table),
        Category::Throwing => throwing(table),
        Category::Running => running(table),
        Category::Mobility => mobility(table),
        Category::Dynamo => force_plate_columns(table),
    }
}

/// Claim every column whose lowercased name contains one of `tokens`; each
/// becomes a metric named by `key_for(column)`.
fn claim_by_tokens(
    category: Category,
    table: &MeasurementTable,
    tokens: &[&str],
    key_for: impl Fn(&str) -> String,
) -> Extraction {
    let mut out = Extraction::new(category);
    for column in table.columns() {
        if JOIN_COLUMNS.contains(&column.as_str()) {
            continue;
        }
        let lower = column.to_lowercase();
        if !tokens.iter().any(|t| lower.contains(t)) {
            continue;
        }
        out.claimed.push(column.clone());
        match MetricSummary::from_values(&table.numeric_values(column)) {
            Some(summary) => {
                out.metrics.insert(key_for(column), summary);
            }
            None => debug!("{}: column '{}' has no numeric values", category, column),
        }
    }
    out.finish(table)
}

/// Bat-swing sensor metrics, keyed by canonical label.
pub fn bat_swing(table: &MeasurementTable) -> Extraction {
    let mut out = Extraction::new(Category::Blast);
    for label in BAT_SWING_METRICS {
        let Some(column) = table.columns().iter().find(|c| c.trim().eq_ignore_ascii_case(label)) else {
            continue;
        };
        out.claimed.push(column.clone());
        if let Some(summary) = MetricSummary::from_values(&table.numeric_values(column)) {
            out.metrics.insert(label.to_string(), summary);
        }
    }
    out.finish(table)
}

/// Any column mentioning "velocity".
pub fn throwing(table: &MeasurementTable) -> Extraction {
    claim_by_tokens(Category::Throwing, table, &THROWING_TOKENS, str::to_string)
}

/// Sprint and shuttle times.
pub fn running(table: &MeasurementTable) -> Extraction {
    claim_by_tokens(Category::Running, table, &RUNNING_TOKENS, str::to_string)
}

/// Mobility screens. Keys drop a trailing "Mobility" word, so
/// `Ankle Mobility` is reported as `Ankle`.
pub fn mobility(table: &MeasurementTable) -> Extraction {
    claim_by_tokens(Category::Mobility, table, &MOBILITY_TOKENS, mobility_key)
}

fn mobility_key(column: &str) -> String {
    const SUFFIX: &str = "mobility";
    let trimmed = column.trim();
    let split = trimmed.len().saturating_sub(SUFFIX.len());
    match (trimmed.get(..split), trimmed.get(split..)) {
        (Some(rest), Some(tail)) if tail.eq_ignore_ascii_case(SUFFIX) && !rest.trim().is_empty() => {
            rest.trim_end().to_string()
        }
        _ => trimmed.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Exit velocity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExitVelocity {
    pub max: f64,
    pub p90: f64,
    pub count: usize,
}

/// Max and 90th-percentile exit speed. The source column is the first whose
/// name contains both "exit" and "speed".
///
/// `Err` when no such column exists. `Ok(None)` when it exists but holds no
/// numeric values.
pub fn exit_velocity(table: &MeasurementTable) -> Result<Option<ExitVelocity>, ExtractError> {
    let column = exit_speed_column(table).ok_or_else(|| ExtractError::MissingColumn {
        category: Category::Flightscope,
        requirement: "exit speed".to_string(),
    })?;

    let mut values = table.numeric_values(column);
    values.sort_by(f64::total_cmp);
    let (Some(&max), Some(p90)) = (values.last(), percentile(&values, 0.9)) else {
        return Ok(None);
    };
    Ok(Some(ExitVelocity {
        max,
        p90,
        count: values.len(),
    }))
}

fn exit_speed_column(table: &MeasurementTable) -> Option<&str> {
    table.find_column(|c| c.contains("exit") && c.contains("speed"))
}

/// Linear-interpolated percentile of ascending `sorted` values, `p` in 0..=1.
/// Rank is `(n - 1) * p`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Batted-ball extraction: the exit-velocity metrics plus claims for the
/// ball-flight columns.
fn batted_ball(table: &MeasurementTable) -> Extraction {
    let mut out = Extraction::new(Category::Flightscope);
    match exit_velocity(table) {
        Ok(ev) => {
            if let Some(column) = exit_speed_column(table) {
                out.claimed.push(column.to_string());
            }
            if let Some(ev) = ev {
                // Both EV metrics are single values; min/max carry the value itself.
                for (metric, v) in [(MAX_EV_METRIC, ev.max), (P90_EV_METRIC, ev.p90)] {
                    out.metrics.insert(
                        metric.to_string(),
                        MetricSummary {
                            mean: v,
                            min: v,
                            max: v,
                            count: ev.count,
                        },
                    );
                }
            }
        }
        Err(e) => {
            warn!("{}", e);
            out.issues.push(e);
        }
    }
    for name in [HIT_POLY_X, HIT_POLY_Z] {
        if let Some(column) = table.resolve_column(name) {
            out.claimed.push(column.to_string());
        }
    }
    out.finish(table)
}

// ---------------------------------------------------------------------------
// Ball flight
// ---------------------------------------------------------------------------

const HIT_POLY_X: &str = "Hit_Poly_X";
const HIT_POLY_Z: &str = "Hit_Poly_Z";
const POLY_TERMS: usize = 5;

/// A located batted ball.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlightPoint {
    pub x: f64,
    pub z: f64,
    /// Exit speed for the row, when numeric and positive.
    pub exit_speed: Option<f64>,
    /// Inches, catcher's view (positive toward the first-base side).
    pub plate_side: f64,
    /// Inches above the ground.
    pub plate_height: f64,
}

/// Evaluate a semicolon-delimited five-term polynomial at `t`.
///
/// `None` when there are fewer than five coefficients, any coefficient fails
/// to parse, or the result is not finite. Only the first five terms are
/// evaluated.
pub fn eval_poly(coefficients: &str, t: f64) -> Option<f64> {
    let terms = coefficients
        .split(';')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    if terms.len() < POLY_TERMS {
        return None;
    }
    let sum: f64 = terms
        .iter()
        .take(POLY_TERMS)
        .enumerate()
        .map(|(i, c)| c * t.powi(i as i32))
        .sum();
    sum.is_finite().then_some(sum)
}

/// One point per row whose x and z polynomials both evaluate at t = 0.
pub fn ball_flight_points(table: &MeasurementTable) -> Vec<FlightPoint> {
    let (Some(x_col), Some(z_col)) = (table.resolve_column(HIT_POLY_X), table.resolve_column(HIT_POLY_Z)) else {
        return Vec::new();
    };
    let speed_col = exit_speed_column(table);

    let mut points = Vec::new();
    let mut discarded = 0usize;
    for row in table.rows() {
        let eval = |cell: &Cell| match cell {
            Cell::Text(s) => eval_poly(s, 0.0),
            _ => None,
        };
        let (Some(x), Some(z)) = (eval(row.get(x_col)), eval(row.get(z_col))) else {
            discarded += 1;
            continue;
        };
        let exit_speed = speed_col
            .and_then(|c| row.get(c).as_number())
            .filter(|v| *v > 0.0);
        points.push(FlightPoint {
            x,
            z,
            exit_speed,
            plate_side: -x * 12.0,
            plate_height: z * 12.0,
        });
    }
    if discarded > 0 {
        debug!("ball flight: discarded {} rows without usable polynomials", discarded);
    }
    points
}

// ---------------------------------------------------------------------------
// Force plate
// ---------------------------------------------------------------------------

const MOVEMENT_COLUMN: &str = "Movement";
const TYPE_COLUMN: &str = "Type";

/// Force-plate value columns, in display order.
pub const FORCE_PLATE_COLUMNS: [&str; 6] = [
    "ROM Asymmetry (%)",
    "Force Asymmetry (%)",
    "L Max ROM (\u{b0})",
    "R Max ROM (\u{b0})",
    "L Max Force (N)",
    "R Max Force (N)",
];

/// Mean force-plate values for one (movement, type) group. Each value lines up
/// with `FORCE_PLATE_COLUMNS`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForcePlateRow {
    pub movement: String,
    pub kind: String,
    pub values: Vec<Option<f64>>,
}

impl ForcePlateRow {
    pub fn value(&self, column: &str) -> Option<f64> {
        let i = FORCE_PLATE_COLUMNS.iter().position(|c| *c == column)?;
        self.values.get(i).copied().flatten()
    }
}

fn force_plate_columns(table: &MeasurementTable) -> Extraction {
    let mut out = Extraction::new(Category::Dynamo);
    for name in [MOVEMENT_COLUMN, TYPE_COLUMN].into_iter().chain(FORCE_PLATE_COLUMNS) {
        if let Some(column) = table.resolve_column(name) {
            out.claimed.push(column.to_string());
        }
    }
    out.finish(table)
}

/// Group rows by (movement, type) in first-seen order and average each value
/// column. Rows missing either key are skipped.
pub fn force_plate(table: &MeasurementTable) -> Vec<ForcePlateRow> {
    let (Some(movement_col), Some(type_col)) =
        (table.resolve_column(MOVEMENT_COLUMN), table.resolve_column(TYPE_COLUMN))
    else {
        return Vec::new();
    };
    let value_cols: Vec<Option<&str>> = FORCE_PLATE_COLUMNS
        .iter()
        .map(|c| table.resolve_column(c))
        .collect();

    let mut groups: Vec<((String, String), Vec<Vec<f64>>)> = Vec::new();
    for row in table.rows() {
        let (Some(movement), Some(kind)) = (row.get(movement_col).as_text(), row.get(type_col).as_text()) else {
            continue;
        };
        let key = (movement.trim().to_string(), kind.trim().to_string());
        let idx = match groups.iter().position(|(k, _)| *k == key) {
            Some(i) => i,
            None => {
                groups.push((key, vec![Vec::new(); FORCE_PLATE_COLUMNS.len()]));
                groups.len() - 1
            }
        };
        for (slot, col) in value_cols.iter().enumerate() {
            if let Some(v) = col.and_then(|c| row.get(c).as_number()) {
                groups[idx].1[slot].push(v);
            }
        }
    }

    groups
        .into_iter()
        .map(|((movement, kind), samples)| ForcePlateRow {
            movement,
            kind,
            values: samples
                .iter()
                .map(|v| MetricSummary::from_values(v).map(|s| s.mean))
                .collect(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // -- summaries --

    #[test]
    fn throwing_mean_skips_missing() {
        let table = MeasurementTable::from_records(
            &["Player Name", "Positional Throw Velocity"],
            &[
                vec!["Jake Diaz", "58"],
                vec!["Jake Diaz", "61"],
                vec!["Jake Diaz", ""],
                vec!["Jake Diaz", "63"],
            ],
        );
        let out = throwing(&table);
        let s = out.get("Positional Throw Velocity").unwrap();
        assert!((s.mean - 60.6667).abs() < 1e-3);
        assert_eq!(s.count, 3);
        assert_eq!((s.min, s.max), (58.0, 63.0));
        assert!(out.unclaimed.is_empty());
    }

    #[test]
    fn all_unparseable_column_is_absent() {
        let table = MeasurementTable::from_records(
            &["Name", "Pulldown Velocity", "FB Velocity"],
            &[vec!["a", "fast", "80"], vec!["b", "", "82"], vec!["c", "n/a", ""]],
        );
        let out = throwing(&table);
        assert!(out.get("Pulldown Velocity").is_none());
        assert!(!out.metrics.contains_key("Pulldown Velocity"));
        assert!(out.claimed.contains(&"Pulldown Velocity".to_string()));
        assert_eq!(out.mean("FB Velocity"), Some(81.0));
    }

    #[test]
    fn running_claims_each_token_column() {
        let table = MeasurementTable::from_records(
            &["Name", "30yd Time", "60yd Time", "5-5-10 Shuttle Time", "Notes"],
            &[vec!["a", "3.4", "6.8", "11", "ok"], vec!["a", "3.6", "7.1", "", ""]],
        );
        let out = running(&table);
        assert_eq!(out.metrics.len(), 3);
        assert!(approx(out.mean("60yd Time").unwrap(), 6.95));
        assert_eq!(out.unclaimed, vec!["Notes".to_string()]);
    }

    #[test]
    fn mobility_keys_drop_suffix() {
        let table = MeasurementTable::from_records(
            &["Player Name", "Ankle Mobility", "thoracic mobility", "Mobility"],
            &[vec!["a", "3", "4", "2"]],
        );
        let out = mobility(&table);
        assert_eq!(out.mean("Ankle"), Some(3.0));
        assert_eq!(out.mean("thoracic"), Some(4.0));
        assert_eq!(out.mean("Mobility"), Some(2.0));
    }

    #[test]
    fn bat_swing_uses_allow_list() {
        let table = MeasurementTable::from_records(
            &["Name", "bat speed (mph)", "Swing Details", "Plane Score", "Power (kW)"],
            &[vec!["a", "60", "x", "55", "2.5"], vec!["b", "64", "y", "65", ""]],
        );
        let out = bat_swing(&table);
        assert_eq!(out.mean("Bat Speed (mph)"), Some(62.0));
        assert_eq!(out.mean("Plane Score"), Some(60.0));
        assert_eq!(out.mean("Power (kW)"), Some(2.5));
        assert_eq!(out.unclaimed, vec!["Swing Details".to_string()]);
    }

    #[test]
    fn join_columns_never_claimed() {
        let table = MeasurementTable::from_records(
            &["Name", "Pulldown Velocity", "Athlete Key", "Age", "Age Group"],
            &[vec!["a", "70", "a", "15", "jv (14-15)"]],
        );
        let out = throwing(&table);
        assert_eq!(out.claimed, vec!["Pulldown Velocity".to_string()]);
        assert!(out.unclaimed.is_empty());
    }

    // -- exit velocity --

    #[test]
    fn percentile_interpolates() {
        let v = [80.0, 85.0, 90.0, 95.0, 100.0];
        assert!(approx(percentile(&v, 0.9).unwrap(), 98.0));
        assert!(approx(percentile(&v, 0.5).unwrap(), 90.0));
        assert_eq!(percentile(&[72.0], 0.9), Some(72.0));
        assert_eq!(percentile(&[], 0.9), None);
    }

    #[test]
    fn exit_velocity_max_and_p90() {
        let table = MeasurementTable::from_records(
            &["Batter", "Exit_Speed"],
            &[vec!["a", "100"], vec!["a", "80"], vec!["a", "bad"], vec!["a", "90"], vec!["a", "95"], vec!["a", "85"]],
        );
        let ev = exit_velocity(&table).unwrap().unwrap();
        assert_eq!(ev.max, 100.0);
        assert!(approx(ev.p90, 98.0));
        assert_eq!(ev.count, 5);
    }

    #[test]
    fn missing_exit_column_is_reported() {
        let table = MeasurementTable::from_records(&["Batter", "Launch Angle"], &[vec!["a", "12"]]);
        let err = exit_velocity(&table).unwrap_err();
        assert!(matches!(err, ExtractError::MissingColumn { category: Category::Flightscope, .. }));

        let out = extract(Category::Flightscope, &table);
        assert_eq!(out.issues.len(), 1);
        assert!(out.get(MAX_EV_METRIC).is_none());
        assert!(out.get(P90_EV_METRIC).is_none());
    }

    #[test]
    fn empty_exit_column_is_absent_not_error() {
        let table = MeasurementTable::from_records(&["Batter", "Exit Speed (mph)"], &[vec!["a", ""]]);
        assert_eq!(exit_velocity(&table).unwrap(), None);
        let out = extract(Category::Flightscope, &table);
        assert!(out.issues.is_empty());
        assert!(out.metrics.is_empty());
    }

    // -- ball flight --

    #[test]
    fn eval_poly_at_zero_is_first_coefficient() {
        assert_eq!(eval_poly("1.5;2;3;4;5", 0.0), Some(1.5));
        assert_eq!(eval_poly("1;1;1;1;1", 2.0), Some(31.0));
        assert_eq!(eval_poly("1;2;3;4", 0.0), None);
        assert_eq!(eval_poly("1;x;3;4;5", 0.0), None);
        assert_eq!(eval_poly("1e400;0;0;0;0", 0.0), None);
    }

    #[test]
    fn eval_poly_rejects_bad_trailing_terms() {
        assert_eq!(eval_poly("1;2;3;4;5;x", 0.0), None);
        assert_eq!(eval_poly("1;2;3;4;5;", 0.0), None);
        assert_eq!(eval_poly("1;2;3;4;5;6", 0.0), Some(1.0));
    }

    #[test]
    fn ball_flight_discards_bad_rows() {
        let table = MeasurementTable::from_records(
            &["Batter", "Exit_Speed", "Hit_Poly_X", "Hit_Poly_Z"],
            &[
                vec!["a", "88", "0.5;1;1;1;1", "2;0;0;0;0"],
                vec!["a", "0", "-0.25;1;1;1;1", "1.5;0;0;0;0"],
                vec!["a", "90", "1;2;3", "2;0;0;0;0"],
                vec!["a", "91", "", "2;0;0;0;0"],
            ],
        );
        let points = ball_flight_points(&table);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].exit_speed, Some(88.0));
        assert_eq!(points[0].plate_side, -6.0);
        assert_eq!(points[0].plate_height, 24.0);
        assert_eq!(points[1].exit_speed, None);
    }

    // -- force plate --

    #[test]
    fn force_plate_groups_in_first_seen_order() {
        let table = MeasurementTable::from_records(
            &["Name", "Movement", "Type", "ROM Asymmetry (%)", "L Max Force (N)"],
            &[
                vec!["a", "Hip", "IR", "10", "200"],
                vec!["a", "Shoulder", "ER", "4", ""],
                vec!["a", "Hip", "IR", "20", "220"],
                vec!["a", "", "IR", "99", "999"],
            ],
        );
        let rows = force_plate(&table);
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].movement.as_str(), rows[0].kind.as_str()), ("Hip", "IR"));
        assert_eq!(rows[0].value("ROM Asymmetry (%)"), Some(15.0));
        assert_eq!(rows[0].value("L Max Force (N)"), Some(210.0));
        assert_eq!(rows[0].value("R Max Force (N)"), None);
        assert_eq!(rows[1].value("L Max Force (N)"), None);
    }
}
