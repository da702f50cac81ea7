// Blank CSV templates for hand-recorded measurements.

use std::io::Write;

/// A header-only CSV handed to coaches for manual data entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub key: &'static str,
    pub file_name: &'static str,
    pub columns: &'static [&'static str],
}

pub const TEMPLATES: [Template; 4] = [
    Template {
        key: "running",
        file_name: "running_speed_template.csv",
        columns: &["Player Name", "30yd Time", "60yd Time", "5-5-10 Shuttle Time"],
    },
    Template {
        key: "core",
        file_name: "core_strength_template.csv",
        columns: &["Player Name", "Core Strength Measurement"],
    },
    Template {
        key: "throwing",
        file_name: "throwing_velocities_template.csv",
        columns: &[
            "Player Name",
            "Positional Throw Velocity",
            "Pulldown Velocity",
            "FB Velocity",
            "SL Velocity",
            "CB Velocity",
            "CH Velocity",
        ],
    },
    Template {
        key: "mobility",
        file_name: "mobility_template.csv",
        columns: &["Player Name", "Ankle Mobility", "Thoracic Mobility", "Lumbar Mobility"],
    },
];

/// Look a template up by key or file name.
pub fn find_template(name: &str) -> Option<&'static Template> {
    let name = name.trim();
    TEMPLATES
        .iter()
        .find(|t| t.key.eq_ignore_ascii_case(name) || t.file_name.eq_ignore_ascii_case(name))
}

pub fn write_template<W: Write>(template: &Template, w: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(w);
    writer.write_record(template.columns)?;
    writer.flush()?;
    Ok(())
}
