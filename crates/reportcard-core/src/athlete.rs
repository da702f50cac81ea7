// Athlete identity: date of birth, derived age and age group, static profile.

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Name normalization
// ---------------------------------------------------------------------------

/// Dash-like characters that show up in names exported by measurement
/// devices: em dash, en dash, and the Latin-1 control byte 0x96 (which is
/// where a cp1252 en dash lands when the file is decoded as Latin-1).
const DASH_VARIANTS: [char; 3] = ['\u{2014}', '\u{2013}', '\u{0096}'];

/// Canonical comparison key for a person's name: dash variants folded to
/// `-`, surrounding whitespace trimmed, lowercased.
///
/// Idempotent: `normalize_name(&normalize_name(s)) == normalize_name(s)`.
pub fn normalize_name(raw: &str) -> String {
    let folded: String = raw
        .chars()
        .map(|c| if DASH_VARIANTS.contains(&c) { '-' } else { c })
        .collect();
    folded.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Age groups
// ---------------------------------------------------------------------------

/// Age bands used to pick threshold rows. Ordered youngest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeGroup {
    Youth,
    Jv,
    Varsity,
    College,
    Unknown,
}

impl AgeGroup {
    /// The four real bands, in matching order.
    pub const BANDS: [AgeGroup; 4] = [
        AgeGroup::Youth,
        AgeGroup::Jv,
        AgeGroup::Varsity,
        AgeGroup::College,
    ];

    /// Map an age to its band. The first band containing the age wins, so 18
    /// is varsity, not college. Ages outside every band (and unknown ages)
    /// map to `Unknown`.
    pub fn from_age(age: Option<i32>) -> Self {
        let Some(age) = age else {
            return AgeGroup::Unknown;
        };
        Self::BANDS
            .into_iter()
            .find(|band| band.contains(age))
            .unwrap_or(AgeGroup::Unknown)
    }

    fn contains(&self, age: i32) -> bool {
        match self {
            AgeGroup::Youth => (12..=13).contains(&age),
            AgeGroup::Jv => (14..=15).contains(&age),
            AgeGroup::Varsity => (16..=18).contains(&age),
            AgeGroup::College => age >= 18,
            AgeGroup::Unknown => false,
        }
    }

    /// Display label as it appears in threshold files.
    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Youth => "youth (12\u{2013}13)",
            AgeGroup::Jv => "jv (14\u{2013}15)",
            AgeGroup::Varsity => "varsity (16\u{2013}18)",
            AgeGroup::College => "college (18+)",
            AgeGroup::Unknown => "unknown",
        }
    }

    /// Parse a label, tolerating any dash variant, case, and padding.
    pub fn from_label(label: &str) -> Option<Self> {
        let key = normalize_name(label);
        Self::BANDS
            .into_iter()
            .chain(std::iter::once(AgeGroup::Unknown))
            .find(|g| normalize_name(g.label()) == key)
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for AgeGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Whole years between `dob` and `as_of`. Negative when `as_of` precedes the
/// birth date.
pub fn age_on(dob: NaiveDate, as_of: NaiveDate) -> i32 {
    let mut age = as_of.year() - dob.year();
    if (as_of.month(), as_of.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

/// Date formats accepted for date-of-birth cells, tried in order.
const DOB_FORMATS: [&str; 6] = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%Y/%m/%d", "%d-%b-%Y", "%B %d, %Y"];

/// Parse a date of birth in any of the common export formats. A trailing
/// time component (`2009-06-01 00:00:00`) is ignored.
pub fn parse_dob(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let date_part = match trimmed.split_once(' ') {
        Some((head, tail)) if tail.contains(':') => head,
        _ => trimmed,
    };
    DOB_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

// ---------------------------------------------------------------------------
// Profile attributes
// ---------------------------------------------------------------------------

/// Primary fielding position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Position {
    Pitcher,
    Catcher,
    FirstBase,
    SecondBase,
    ThirdBase,
    ShortStop,
    LeftField,
    CenterField,
    RightField,
    DesignatedHitter,
}

impl Position {
    /// Parse a position string. Accepts both the spelled-out pitcher/catcher
    /// labels and the usual abbreviations.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PITCHER" | "P" | "SP" | "RP" => Some(Position::Pitcher),
            "CATCHER" | "C" => Some(Position::Catcher),
            "1B" => Some(Position::FirstBase),
            "2B" => Some(Position::SecondBase),
            "3B" => Some(Position::ThirdBase),
            "SS" => Some(Position::ShortStop),
            "LF" => Some(Position::LeftField),
            "CF" => Some(Position::CenterField),
            "RF" => Some(Position::RightField),
            "DH" => Some(Position::DesignatedHitter),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Pitcher => "Pitcher",
            Position::Catcher => "Catcher",
            Position::FirstBase => "1B",
            Position::SecondBase => "2B",
            Position::ThirdBase => "3B",
            Position::ShortStop => "SS",
            Position::LeftField => "LF",
            Position::CenterField => "CF",
            Position::RightField => "RF",
            Position::DesignatedHitter => "DH",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Handedness {
    Left,
    Right,
    Switch,
}

impl Handedness {
    pub fn from_str_hand(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "L" | "LEFT" => Some(Handedness::Left),
            "R" | "RIGHT" => Some(Handedness::Right),
            "S" | "B" | "SWITCH" => Some(Handedness::Switch),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
            Handedness::Switch => "Switch",
        }
    }
}

/// Parse a height cell into inches. Accepts plain inches (`70`, `70.0`) and
/// feet/inches notation (`5'10`, `5'10"`, `5-10`).
pub fn parse_height(raw: &str) -> Option<u32> {
    let s = raw.trim().trim_end_matches('"');
    if s.is_empty() {
        return None;
    }
    if let Ok(inches) = s.parse::<f64>() {
        return (inches.is_finite() && inches >= 0.0).then(|| inches.round() as u32);
    }
    let (feet, inches) = s.split_once('\'').or_else(|| s.split_once('-'))?;
    let feet: u32 = feet.trim().parse().ok()?;
    let inches: u32 = match inches.trim() {
        "" => 0,
        rest => rest.parse().ok()?,
    };
    (inches < 12).then_some(feet * 12 + inches)
}

// ---------------------------------------------------------------------------
// Athlete
// ---------------------------------------------------------------------------

/// A rostered athlete. Age and age group are never stored; they are derived
/// from `dob` against a reference date every time they are needed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Athlete {
    pub name: String,
    pub dob: Option<NaiveDate>,
    pub class: String,
    pub school: String,
    /// Height in inches.
    pub height: Option<u32>,
    /// Weight in pounds.
    pub weight: Option<u32>,
    pub position: Option<Position>,
    pub bats: Option<Handedness>,
    pub throws: Option<Handedness>,
}

impl Athlete {
    /// A bare athlete with only the identifying fields set.
    pub fn new(name: impl Into<String>, dob: Option<NaiveDate>) -> Self {
        Self {
            name: name.into(),
            dob,
            class: String::new(),
            school: String::new(),
            height: None,
            weight: None,
            position: None,
            bats: None,
            throws: None,
        }
    }

    /// Normalized join key for this athlete.
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn age_on(&self, as_of: NaiveDate) -> Option<i32> {
        self.dob.map(|dob| age_on(dob, as_of))
    }

    pub fn age_group_on(&self, as_of: NaiveDate) -> AgeGroup {
        AgeGroup::from_age(self.age_on(as_of))
    }

    /// Batting/throwing summary such as `Right/Left`. Missing sides are
    /// dropped along with the separator.
    pub fn bats_throws(&self) -> String {
        let bats = self.bats.map(|h| h.display_str()).unwrap_or("");
        let throws = self.throws.map(|h| h.display_str()).unwrap_or("");
        format!("{bats}/{throws}")
            .trim_end_matches('/')
            .trim_start_matches('/')
            .to_string()
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

    // -- Normalization --

    #[test]
    fn dash_variants_fold_to_hyphen() {
        assert_eq!(normalize_name("O'Brien\u{2013}J"), "o'brien-j");
        assert_eq!(normalize_name("O'Brien\u{2014}J"), "o'brien-j");
        assert_eq!(normalize_name("O'Brien\u{0096}J"), "o'brien-j");
        assert_eq!(normalize_name("  O'Brien-J "), "o'brien-j");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["  Jake DIAZ ", "O'Brien\u{2014}J", "", "\u{2013}", "Ana-María López"] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "not idempotent for {raw:?}");
        }
    }

    // -- Age and age group --

    #[test]
    fn age_counts_whole_years() {
        let dob = date(2009, 6, 1);
        assert_eq!(age_on(dob, date(2024, 5, 31)), 14);
        assert_eq!(age_on(dob, date(2024, 6, 1)), 15);
        assert_eq!(age_on(dob, date(2024, 6, 2)), 15);
    }

    #[test]
    fn age_group_bands() {
        assert_eq!(AgeGroup::from_age(Some(11)), AgeGroup::Unknown);
        assert_eq!(AgeGroup::from_age(Some(12)), AgeGroup::Youth);
        assert_eq!(AgeGroup::from_age(Some(13)), AgeGroup::Youth);
        assert_eq!(AgeGroup::from_age(Some(14)), AgeGroup::Jv);
        assert_eq!(AgeGroup::from_age(Some(15)), AgeGroup::Jv);
        assert_eq!(AgeGroup::from_age(Some(16)), AgeGroup::Varsity);
        assert_eq!(AgeGroup::from_age(Some(18)), AgeGroup::Varsity);
        assert_eq!(AgeGroup::from_age(Some(19)), AgeGroup::College);
        assert_eq!(AgeGroup::from_age(None), AgeGroup::Unknown);
    }

    #[test]
    fn jake_diaz_is_jv_in_june_2024() {
        let jake = Athlete::new("Jake Diaz", Some(date(2009, 6, 1)));
        let as_of = date(2024, 6, 2);
        assert_eq!(jake.age_on(as_of), Some(15));
        assert_eq!(jake.age_group_on(as_of), AgeGroup::Jv);
        assert_eq!(jake.age_group_on(as_of).label(), "jv (14\u{2013}15)");
    }

    #[test]
    fn labels_parse_with_any_dash() {
        assert_eq!(AgeGroup::from_label("jv (14-15)"), Some(AgeGroup::Jv));
        assert_eq!(AgeGroup::from_label("JV (14\u{2014}15)"), Some(AgeGroup::Jv));
        assert_eq!(AgeGroup::from_label("college (18+)"), Some(AgeGroup::College));
        assert_eq!(AgeGroup::from_label("minors"), None);
        for g in AgeGroup::BANDS {
            assert_eq!(AgeGroup::from_label(g.label()), Some(g));
        }
    }

    // -- Parsing helpers --

    #[test]
    fn dob_formats() {
        assert_eq!(parse_dob("2009-06-01"), Some(date(2009, 6, 1)));
        assert_eq!(parse_dob("06/01/2009"), Some(date(2009, 6, 1)));
        assert_eq!(parse_dob("2009/06/01"), Some(date(2009, 6, 1)));
        assert_eq!(parse_dob("01-Jun-2009"), Some(date(2009, 6, 1)));
        assert_eq!(parse_dob("June 01, 2009"), Some(date(2009, 6, 1)));
        assert_eq!(parse_dob("2009-06-01 00:00:00"), Some(date(2009, 6, 1)));
        assert_eq!(parse_dob("not a date"), None);
        assert_eq!(parse_dob(""), None);
    }

    #[test]
    fn height_formats() {
        assert_eq!(parse_height("70"), Some(70));
        assert_eq!(parse_height("70.4"), Some(70));
        assert_eq!(parse_height("5'10\""), Some(70));
        assert_eq!(parse_height("5'10"), Some(70));
        assert_eq!(parse_height("6'"), Some(72));
        assert_eq!(parse_height("5-13"), None);
        assert_eq!(parse_height(""), None);
    }

    #[test]
    fn position_and_handedness_parse() {
        assert_eq!(Position::from_str_pos("pitcher"), Some(Position::Pitcher));
        assert_eq!(Position::from_str_pos("ss"), Some(Position::ShortStop));
        assert_eq!(Position::from_str_pos("XX"), None);
        assert_eq!(Handedness::from_str_hand("L"), Some(Handedness::Left));
        assert_eq!(Handedness::from_str_hand("switch"), Some(Handedness::Switch));
    }

    #[test]
    fn bats_throws_summary() {
        let mut a = Athlete::new("A", None);
        assert_eq!(a.bats_throws(), "");
        a.bats = Some(Handedness::Right);
        assert_eq!(a.bats_throws(), "Right");
        a.throws = Some(Handedness::Left);
        assert_eq!(a.bats_throws(), "Right/Left");
    }
}
