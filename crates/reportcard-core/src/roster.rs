// Roster CSV import/export.
//
// The roster file carries `Name` and `DOB` plus optional profile columns.
// `Age` and `Age Group` columns are accepted on input but ignored: both are
// always recomputed from the date of birth.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::athlete::{normalize_name, parse_dob, parse_height, Athlete, Handedness, Position};

/// Column order used when writing a roster back out.
pub const ROSTER_COLUMNS: [&str; 11] = [
    "Name",
    "DOB",
    "Age",
    "Age Group",
    "Class",
    "High School",
    "Height",
    "Weight",
    "Position",
    "BattingHandedness",
    "ThrowingHandedness",
];

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

/// Raw roster row. Every field is optional text so one bad cell never sinks
/// the row; interpretation happens in `into_athlete`.
#[derive(Debug, Deserialize)]
struct RawRosterRow {
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "DOB", default)]
    dob: Option<String>,
    #[serde(rename = "Class", default)]
    class: Option<String>,
    #[serde(rename = "High School", alias = "School", default)]
    school: Option<String>,
    #[serde(rename = "Height", default)]
    height: Option<String>,
    #[serde(rename = "Weight", default)]
    weight: Option<String>,
    #[serde(rename = "Position", default)]
    position: Option<String>,
    #[serde(rename = "BattingHandedness", default)]
    bats: Option<String>,
    #[serde(rename = "ThrowingHandedness", default)]
    throws: Option<String>,
}

impl RawRosterRow {
    fn into_athlete(self) -> Option<Athlete> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return None;
        }
        let text = |v: Option<String>| v.map(|s| s.trim().to_string()).unwrap_or_default();

        let dob = self.dob.as_deref().and_then(parse_dob);
        if dob.is_none() {
            warn!("roster entry '{}' has no usable DOB; age group will be unknown", name);
        }

        Some(Athlete {
            name: name.to_string(),
            dob,
            class: text(self.class),
            school: text(self.school),
            height: self.height.as_deref().and_then(parse_height),
            weight: self
                .weight
                .as_deref()
                .and_then(|w| w.trim().parse::<f64>().ok())
                .filter(|w| w.is_finite() && *w >= 0.0)
                .map(|w| w.round() as u32),
            position: self.position.as_deref().and_then(Position::from_str_pos),
            bats: self.bats.as_deref().and_then(Handedness::from_str_hand),
            throws: self.throws.as_deref().and_then(Handedness::from_str_hand),
        })
    }
}

/// Read a roster from any CSV source. Rows without a name or that fail to
/// parse are skipped with a warning. Later rows replace earlier rows with the
/// same normalized name.
pub fn load_roster_from_reader<R: Read>(rdr: R) -> Result<Vec<Athlete>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let mut athletes: Vec<Athlete> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for result in reader.deserialize::<RawRosterRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed roster row: {}", e);
                continue;
            }
        };
        let Some(athlete) = raw.into_athlete() else {
            warn!("skipping roster row with empty name");
            continue;
        };
        let key = athlete.key();
        match index.get(&key) {
            Some(&i) => {
                warn!("duplicate roster entry for '{}', using latest row", athlete.name);
                athletes[i] = athlete;
            }
            None => {
                index.insert(key, athletes.len());
                athletes.push(athlete);
            }
        }
    }
    Ok(athletes)
}

/// Load a roster CSV file.
pub fn load_roster(path: &Path) -> Result<Vec<Athlete>, RosterError> {
    let file = std::fs::File::open(path).map_err(|e| RosterError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_roster_from_reader(file).map_err(|e| RosterError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Write a roster in `ROSTER_COLUMNS` order, with age and age group derived
/// as of `as_of`.
pub fn write_roster<W: Write>(athletes: &[Athlete], as_of: NaiveDate, w: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(w);
    writer.write_record(ROSTER_COLUMNS)?;
    for a in athletes {
        let opt = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_default();
        writer.write_record([
            a.name.clone(),
            a.dob.map(|d| d.format("%m/%d/%Y").to_string()).unwrap_or_default(),
            a.age_on(as_of).map(|n| n.to_string()).unwrap_or_default(),
            a.age_group_on(as_of).label().to_string(),
            a.class.clone(),
            a.school.clone(),
            opt(a.height),
            opt(a.weight),
            a.position.map(|p| p.display_str().to_string()).unwrap_or_default(),
            a.bats.map(|h| h.display_str().to_string()).unwrap_or_default(),
            a.throws.map(|h| h.display_str().to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Find an athlete by name, comparing normalized keys.
pub fn find_athlete<'a>(athletes: &'a [Athlete], name: &str) -> Option<&'a Athlete> {
    let key = normalize_name(name);
    athletes.iter().find(|a| a.key() == key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
