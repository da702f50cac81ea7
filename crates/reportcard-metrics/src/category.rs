// Measurement categories: which device produced a table, where its subject
// names live, and how rows are sliced for a single athlete.

use std::fmt;

use serde::Serialize;

/// A measurement source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Bat-swing sensor.
    Blast,
    /// Batted-ball tracking (exit velocity, ball flight).
    Flightscope,
    Throwing,
    Running,
    Mobility,
    /// Force plate.
    Dynamo,
}

/// How a category's rows are narrowed to one athlete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceRule {
    /// Rows whose resolved athlete key equals the athlete's key.
    ByName,
    /// Rows whose age group equals the athlete's age group.
    ByAgeGroup,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Blast,
        Category::Flightscope,
        Category::Throwing,
        Category::Running,
        Category::Mobility,
        Category::Dynamo,
    ];

    /// Short identifier used on the command line and in file names.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Blast => "blast",
            Category::Flightscope => "flightscope",
            Category::Throwing => "throwing",
            Category::Running => "running",
            Category::Mobility => "mobility",
            Category::Dynamo => "dynamo",
        }
    }

    /// Human-readable name, written into the `Type` column of merged files.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Blast => "Blast",
            Category::Flightscope => "Flightscope",
            Category::Throwing => "Throwing Velocities",
            Category::Running => "Running Speed",
            Category::Mobility => "Mobility",
            Category::Dynamo => "Dynamo",
        }
    }

    /// Parse either the short key or the display name, case-insensitively.
    pub fn from_str_category(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s) || c.display_name().eq_ignore_ascii_case(s))
    }

    /// Candidate subject-name columns, in preference order.
    pub fn subject_columns(&self) -> &'static [&'static str] {
        match self {
            Category::Blast => &["Name"],
            Category::Flightscope => &["Name", "Player Name", "Batter"],
            Category::Throwing => &["Name", "Player Name"],
            Category::Running => &["Name", "Player Name", "AthleteID"],
            Category::Mobility => &["Name", "Batter", "Player Name"],
            Category::Dynamo => &["Name"],
        }
    }

    /// Swing and batted-ball data compare the athlete against the age-group
    /// cohort; everything else is the athlete's own rows.
    pub fn slice_rule(&self) -> SliceRule {
        match self {
            Category::Blast | Category::Flightscope => SliceRule::ByAgeGroup,
            _ => SliceRule::ByName,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_and_display_names() {
        assert_eq!(Category::from_str_category("blast"), Some(Category::Blast));
        assert_eq!(Category::from_str_category("Running Speed"), Some(Category::Running));
        assert_eq!(Category::from_str_category(" THROWING "), Some(Category::Throwing));
        assert_eq!(Category::from_str_category("rapsodo"), None);
    }

    #[test]
    fn slice_rules() {
        assert_eq!(Category::Blast.slice_rule(), SliceRule::ByAgeGroup);
        assert_eq!(Category::Flightscope.slice_rule(), SliceRule::ByAgeGroup);
        assert_eq!(Category::Dynamo.slice_rule(), SliceRule::ByName);
        assert_eq!(Category::Running.slice_rule(), SliceRule::ByName);
    }

    #[test]
    fn running_accepts_athlete_id_column() {
        assert!(Category::Running.subject_columns().contains(&"AthleteID"));
        assert_eq!(Category::Mobility.subject_columns()[1], "Batter");
    }
}
