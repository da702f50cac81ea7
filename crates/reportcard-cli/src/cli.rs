// Command-line surface.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use reportcard_core::athlete::parse_dob;

#[derive(Parser)]
#[command(name = "reportcard")]
#[command(about = "Athlete performance scorecards from device exports", long_about = None)]
pub struct Cli {
    /// Project directory holding defaults/, config/, and data files.
    #[arg(long, global = true, default_value = ".")]
    pub dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the player roster
    #[command(subcommand)]
    Player(PlayerCommand),
    /// Manage scout notes
    #[command(subcommand)]
    Note(NoteCommand),
    /// Inspect and edit the threshold table
    #[command(subcommand)]
    Thresholds(ThresholdsCommand),
    /// Concatenate several exports of one category into one CSV
    Merge {
        /// Category of every input file (blast, flightscope, throwing, running, mobility, dynamo)
        #[arg(long)]
        category: String,
        /// Output file; defaults to merged_<category name>.csv, e.g. merged_running_speed.csv
        #[arg(long)]
        out: Option<PathBuf>,
        /// Per-file labels, in input order; defaults to each file's stem
        #[arg(long = "label")]
        labels: Vec<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Write blank CSV templates for hand-recorded measurements
    Template {
        /// Template key (running, core, throwing, mobility) or "all"
        #[arg(default_value = "all")]
        name: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Build one athlete's scorecard from measurement uploads
    Report(ReportArgs),
}

#[derive(Args, Clone, Default)]
pub struct ProfileArgs {
    /// Date of birth (YYYY-MM-DD or MM/DD/YYYY)
    #[arg(long, value_parser = parse_date)]
    pub dob: Option<NaiveDate>,
    #[arg(long)]
    pub class: Option<String>,
    #[arg(long)]
    pub school: Option<String>,
    /// Height in inches or feet'inches
    #[arg(long)]
    pub height: Option<String>,
    /// Weight in pounds
    #[arg(long)]
    pub weight: Option<u32>,
    #[arg(long)]
    pub position: Option<String>,
    #[arg(long)]
    pub bats: Option<String>,
    #[arg(long)]
    pub throws: Option<String>,
}

#[derive(Subcommand)]
pub enum PlayerCommand {
    /// Add a player
    Add {
        name: String,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Edit a player in place; only the given fields change
    Edit {
        name: String,
        #[arg(long)]
        rename: Option<String>,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Remove a player
    Remove { name: String },
    /// List players with derived age and age group
    List {
        #[arg(long, value_parser = parse_date)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Bulk import a roster CSV (existing players with the same name are replaced)
    Import { csv: PathBuf },
    /// Export the roster as CSV
    Export {
        out: PathBuf,
        #[arg(long, value_parser = parse_date)]
        as_of: Option<NaiveDate>,
    },
    /// Remove every player
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum NoteCommand {
    /// Add a dated note for a player
    Add {
        athlete: String,
        text: String,
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// List notes, newest first
    List {
        #[arg(long)]
        athlete: Option<String>,
    },
    /// Delete one note by id
    Remove { id: i64 },
    /// Delete every note
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ThresholdsCommand {
    /// Print the active thresholds
    Show {
        /// Only this age group (e.g. "jv (14-15)")
        #[arg(long)]
        group: Option<String>,
    },
    /// Set one (age group, metric) entry
    Set {
        #[arg(long)]
        group: String,
        #[arg(long)]
        metric: String,
        #[arg(long, allow_hyphen_values = true)]
        below: f64,
        #[arg(long, allow_hyphen_values = true)]
        avg: f64,
        #[arg(long, allow_hyphen_values = true)]
        above: f64,
    },
    /// Write the active thresholds to a CSV file
    Export { out: PathBuf },
    /// Replace the active thresholds with a CSV file
    Import { csv: PathBuf },
    /// Restore the built-in defaults
    Reset,
}

#[derive(Args, Default)]
pub struct ReportArgs {
    /// Athlete name as on the roster
    #[arg(long)]
    pub athlete: String,
    /// Assessment date; ages are computed as of this day (default: today)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub blast: Option<PathBuf>,
    #[arg(long)]
    pub flightscope: Option<PathBuf>,
    #[arg(long)]
    pub throwing: Option<PathBuf>,
    #[arg(long)]
    pub running: Option<PathBuf>,
    #[arg(long)]
    pub mobility: Option<PathBuf>,
    #[arg(long)]
    pub dynamo: Option<PathBuf>,
    /// Bind an upload name to a roster name: --map "Jake Dias=Jake Diaz"
    #[arg(long = "map", value_parser = parse_mapping)]
    pub mappings: Vec<(String, String)>,
    /// Leave an upload name unresolved
    #[arg(long = "skip")]
    pub skips: Vec<String>,
    /// Do not bind unrecognized names to their closest roster match
    #[arg(long)]
    pub no_closest: bool,
    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_dob(s).ok_or_else(|| format!("unrecognized date '{s}'"))
}

fn parse_mapping(s: &str) -> Result<(String, String), String> {
    let (raw, canonical) = s
        .split_once('=')
        .ok_or_else(|| format!("expected RAW=ROSTER_NAME, got '{s}'"))?;
    let (raw, canonical) = (raw.trim(), canonical.trim());
    if raw.is_empty() || canonical.is_empty() {
        return Err(format!("expected RAW=ROSTER_NAME, got '{s}'"));
    }
    Ok((raw.to_string(), canonical.to_string()))
}
