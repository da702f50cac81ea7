// Threshold table: per age group, per metric cut points for tier assignment.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use reportcard_core::athlete::AgeGroup;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Metrics where a smaller number is the better result. Closed list; direction
/// is never configurable per age group.
pub const LOWER_IS_BETTER: [&str; 3] = ["30yd Time", "60yd Time", "5-5-10 Shuttle Time"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Direction for a metric, by exact name.
pub fn direction(metric: &str) -> Direction {
    if LOWER_IS_BETTER.contains(&metric) {
        Direction::LowerIsBetter
    } else {
        Direction::HigherIsBetter
    }
}

/// The three cut points of one (age group, metric) entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cut {
    pub below_avg: f64,
    pub avg: f64,
    pub above_avg: f64,
}

impl Cut {
    pub fn new(below_avg: f64, avg: f64, above_avg: f64) -> Self {
        Self {
            below_avg,
            avg,
            above_avg,
        }
    }

    /// Cut points must step monotonically toward "better" for the metric's
    /// direction, and be finite.
    pub fn is_ordered(&self, dir: Direction) -> bool {
        let finite = [self.below_avg, self.avg, self.above_avg]
            .iter()
            .all(|v| v.is_finite());
        finite
            && match dir {
                Direction::HigherIsBetter => self.below_avg <= self.avg && self.avg <= self.above_avg,
                Direction::LowerIsBetter => self.above_avg <= self.avg && self.avg <= self.below_avg,
            }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ThresholdError {
    #[error("failed to access threshold file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("threshold CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unknown age group '{label}' on line {line}")]
    UnknownAgeGroup { label: String, line: u64 },

    #[error("empty metric name on line {line}")]
    EmptyMetric { line: u64 },

    #[error(
        "thresholds for '{metric}' in {group} are out of order \
         (below_avg={}, avg={}, above_avg={})",
        .cut.below_avg, .cut.avg, .cut.above_avg
    )]
    Disordered {
        group: AgeGroup,
        metric: String,
        cut: Cut,
    },
}

/// One CSV row: `Age Group,Metric,below_avg,avg,above_avg`.
#[derive(Debug, Deserialize)]
struct ThresholdRow {
    #[serde(rename = "Age Group")]
    age_group: String,
    #[serde(rename = "Metric")]
    metric: String,
    below_avg: f64,
    avg: f64,
    above_avg: f64,
}

const CSV_HEADER: [&str; 5] = ["Age Group", "Metric", "below_avg", "avg", "above_avg"];

// ---------------------------------------------------------------------------
// Built-in defaults
// ---------------------------------------------------------------------------

/// Default cuts as (metric, above_avg, avg, below_avg), applied to every band.
const DEFAULT_CUTS: [(&str, f64, f64, f64); 22] = [
    ("Plane Score", 70.0, 60.0, 40.0),
    ("Connection Score", 70.0, 60.0, 40.0),
    ("Rotation Score", 70.0, 60.0, 40.0),
    ("Attack Angle (deg)", 10.0, 7.0, 5.0),
    ("On Plane Efficiency (%)", 70.0, 60.0, 40.0),
    ("Time to Contact (sec)", 0.14, 0.10, 0.08),
    ("Bat Speed (mph)", 70.0, 60.0, 50.0),
    ("Rotational Acceleration (g)", 15.0, 12.0, 10.0),
    ("Peak Hand Speed (mph)", 20.0, 18.0, 15.0),
    ("Connection at Impact (deg)", 80.0, 75.0, 65.0),
    ("Early Connection (deg)", 95.0, 80.0, 70.0),
    ("Vertical Bat Angle (deg)", -20.0, -30.0, -40.0),
    ("Max EV (mph)", 95.0, 90.0, 85.0),
    ("90th % EV (mph)", 95.0, 85.0, 80.0),
    ("Positional Throw Velocity", 60.0, 50.0, 45.0),
    ("Pulldown Velocity", 65.0, 55.0, 45.0),
    ("30yd Time", 3.0, 3.5, 4.0),
    ("60yd Time", 6.0, 6.5, 7.0),
    ("5-5-10 Shuttle Time", 10.0, 11.0, 13.0),
    ("Ankle", 4.0, 3.0, 1.0),
    ("Thoracic", 4.0, 3.0, 1.0),
    ("Lumbar", 4.0, 3.0, 1.0),
];

// ---------------------------------------------------------------------------
// ThresholdTable
// ---------------------------------------------------------------------------

/// Cut points keyed by age group, then metric. Metrics keep insertion order,
/// which is the order entries appear on a scorecard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdTable {
    groups: BTreeMap<AgeGroup, Vec<(String, Cut)>>,
}

impl ThresholdTable {
    /// An empty table (every lookup misses).
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table: the same cuts for every band.
    pub fn defaults() -> Self {
        let mut table = Self::new();
        for group in AgeGroup::BANDS {
            let metrics = DEFAULT_CUTS
                .iter()
                .map(|&(metric, above, avg, below)| (metric.to_string(), Cut::new(below, avg, above)))
                .collect();
            table.groups.insert(group, metrics);
        }
        table
    }

    pub fn get(&self, group: AgeGroup, metric: &str) -> Option<&Cut> {
        self.groups
            .get(&group)?
            .iter()
            .find(|(m, _)| m == metric)
            .map(|(_, cut)| cut)
    }

    /// Metrics defined for `group`, in table order.
    pub fn metrics(&self, group: AgeGroup) -> impl Iterator<Item = (&str, &Cut)> {
        self.groups
            .get(&group)
            .into_iter()
            .flatten()
            .map(|(m, cut)| (m.as_str(), cut))
    }

    /// Age groups that have at least one entry.
    pub fn groups(&self) -> impl Iterator<Item = AgeGroup> + '_ {
        self.groups.keys().copied()
    }

    /// Total number of (group, metric) entries.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace one entry. Rejects cuts that are not ordered for the
    /// metric's direction; the table is left unchanged in that case.
    pub fn set(&mut self, group: AgeGroup, metric: &str, cut: Cut) -> Result<(), ThresholdError> {
        if !cut.is_ordered(direction(metric)) {
            return Err(ThresholdError::Disordered {
                group,
                metric: metric.to_string(),
                cut,
            });
        }
        let entries = self.groups.entry(group).or_default();
        match entries.iter_mut().find(|(m, _)| m == metric) {
            Some((_, existing)) => *existing = cut,
            None => entries.push((metric.to_string(), cut)),
        }
        Ok(())
    }

    /// Remove one entry. Returns whether it existed.
    pub fn remove(&mut self, group: AgeGroup, metric: &str) -> bool {
        let Some(entries) = self.groups.get_mut(&group) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(m, _)| m != metric);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.groups.remove(&group);
        }
        removed
    }

    // -- CSV I/O --

    /// Parse a threshold CSV. Any malformed row fails the whole load.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, ThresholdError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
        let mut table = Self::new();

        for (i, result) in reader.deserialize::<ThresholdRow>().enumerate() {
            let row = result?;
            // Header is line 1.
            let line = i as u64 + 2;
            let group = AgeGroup::from_label(&row.age_group).ok_or_else(|| {
                ThresholdError::UnknownAgeGroup {
                    label: row.age_group.clone(),
                    line,
                }
            })?;
            if row.metric.is_empty() {
                return Err(ThresholdError::EmptyMetric { line });
            }
            table.set(group, &row.metric, Cut::new(row.below_avg, row.avg, row.above_avg))?;
        }
        Ok(table)
    }

    /// Write the table as CSV. Values use the shortest representation that
    /// parses back to the same `f64`.
    pub fn to_writer<W: Write>(&self, w: W) -> Result<(), ThresholdError> {
        let mut writer = csv::Writer::from_writer(w);
        writer.write_record(CSV_HEADER)?;
        for (group, entries) in &self.groups {
            for (metric, cut) in entries {
                writer.write_record([
                    group.label().to_string(),
                    metric.clone(),
                    cut.below_avg.to_string(),
                    cut.avg.to_string(),
                    cut.above_avg.to_string(),
                ])?;
            }
        }
        writer.flush().map_err(|e| ThresholdError::Csv(e.into()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ThresholdError> {
        let file = std::fs::File::open(path).map_err(|e| ThresholdError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ThresholdError> {
        let io_err = |e| ThresholdError::Io {
            path: path.display().to_string(),
            source: e,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = std::fs::File::create(path).map_err(io_err)?;
        self.to_writer(file)
    }

    /// Load `path`, or fall back to the built-in defaults when the file is
    /// missing or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("no threshold file at {}, using built-in defaults", path.display());
            return Self::defaults();
        }
        match Self::load(path) {
            Ok(table) => {
                info!("loaded {} thresholds from {}", table.len(), path.display());
                table
            }
            Err(e) => {
                warn!("ignoring threshold file {}: {}; using built-in defaults", path.display(), e);
                Self::defaults()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
