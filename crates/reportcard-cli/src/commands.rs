// Subcommand handlers. Each writes its user-facing output to `out` and
// returns an error for anything that should stop the command.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use reportcard_core::athlete::{parse_height, AgeGroup, Athlete, Handedness, Position};
use reportcard_core::config::Config;
use reportcard_core::db::Database;
use reportcard_core::notes::notes_for;
use reportcard_core::roster::{load_roster, write_roster};
use reportcard_metrics::category::Category;
use reportcard_metrics::merge::{default_label, merge_tables, merged_file_name, MergeInput};
use reportcard_metrics::resolve::{BindingPolicy, Decision};
use reportcard_metrics::scorecard::{assemble, AppContext};
use reportcard_metrics::table::MeasurementTable;
use reportcard_metrics::templates::{find_template, write_template, Template, TEMPLATES};
use reportcard_metrics::thresholds::{Cut, ThresholdTable};
use tracing::{info, warn};

use crate::cli::{NoteCommand, PlayerCommand, ProfileArgs, ReportArgs, ThresholdsCommand};
use crate::render;

/// Loaded configuration plus open storage, shared by every handler.
pub struct App {
    pub config: Config,
    pub db: Database,
    pub base_dir: PathBuf,
}

impl App {
    fn thresholds_path(&self) -> PathBuf {
        self.base_dir.join(&self.config.storage.thresholds_path)
    }

    fn thresholds(&self) -> ThresholdTable {
        ThresholdTable::load_or_default(&self.thresholds_path())
    }

    fn save_thresholds(&self, table: &ThresholdTable) -> Result<()> {
        let path = self.thresholds_path();
        table
            .save(&path)
            .with_context(|| format!("failed to save thresholds to {}", path.display()))
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Apply the fields given on the command line to `athlete`.
fn apply_profile(athlete: &mut Athlete, p: &ProfileArgs) -> Result<()> {
    if let Some(dob) = p.dob {
        athlete.dob = Some(dob);
    }
    if let Some(class) = &p.class {
        athlete.class = class.trim().to_string();
    }
    if let Some(school) = &p.school {
        athlete.school = school.trim().to_string();
    }
    if let Some(h) = &p.height {
        athlete.height = Some(parse_height(h).with_context(|| format!("invalid height '{h}'"))?);
    }
    if let Some(w) = p.weight {
        athlete.weight = Some(w);
    }
    if let Some(pos) = &p.position {
        athlete.position = Some(Position::from_str_pos(pos).with_context(|| format!("unknown position '{pos}'"))?);
    }
    if let Some(b) = &p.bats {
        athlete.bats = Some(Handedness::from_str_hand(b).with_context(|| format!("invalid batting side '{b}'"))?);
    }
    if let Some(t) = &p.throws {
        athlete.throws = Some(Handedness::from_str_hand(t).with_context(|| format!("invalid throwing side '{t}'"))?);
    }
    Ok(())
}

pub fn player<W: Write>(app: &App, cmd: PlayerCommand, out: &mut W) -> Result<()> {
    match cmd {
        PlayerCommand::Add { name, profile } => {
            let mut athlete = Athlete::new(name.trim(), None);
            apply_profile(&mut athlete, &profile)?;
            if athlete.dob.is_none() {
                bail!("--dob is required when adding a player");
            }
            app.db.add_player(&athlete)?;
            info!("added player {}", athlete.name);
            writeln!(out, "Added {}.", athlete.name)?;
        }
        PlayerCommand::Edit { name, rename, profile } => {
            let Some(mut athlete) = app.db.get_player(&name)? else {
                bail!("player '{name}' not found");
            };
            if let Some(new_name) = rename {
                athlete.name = new_name.trim().to_string();
            }
            apply_profile(&mut athlete, &profile)?;
            app.db.update_player(&name, &athlete)?;
            info!("updated player {}", athlete.name);
            writeln!(out, "Updated {}.", athlete.name)?;
        }
        PlayerCommand::Remove { name } => {
            if !app.db.delete_player(&name)? {
                bail!("player '{name}' not found");
            }
            writeln!(out, "Removed {name}.")?;
        }
        PlayerCommand::List { as_of, json } => {
            let players = app.db.list_players()?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&players)?)?;
            } else if players.is_empty() {
                writeln!(out, "Roster is empty.")?;
            } else {
                write!(out, "{}", render::roster(&players, as_of.unwrap_or_else(today)))?;
            }
        }
        PlayerCommand::Import { csv } => {
            let athletes = load_roster(&csv)?;
            let n = app.db.import_players(&athletes)?;
            info!("imported {} players from {}", n, csv.display());
            writeln!(out, "Imported {n} players from {}.", csv.display())?;
        }
        PlayerCommand::Export { out: path, as_of } => {
            let players = app.db.list_players()?;
            let file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_roster(&players, as_of.unwrap_or_else(today), file)
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(out, "Exported {} players to {}.", players.len(), path.display())?;
        }
        PlayerCommand::Clear { yes } => {
            if !yes {
                bail!("refusing to clear the roster without --yes");
            }
            app.db.clear_players()?;
            warn!("roster cleared");
            writeln!(out, "Roster cleared.")?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

pub fn note<W: Write>(app: &App, cmd: NoteCommand, out: &mut W) -> Result<()> {
    match cmd {
        NoteCommand::Add { athlete, text, date } => {
            let Some(player) = app.db.get_player(&athlete)? else {
                bail!("player '{athlete}' not found");
            };
            if text.trim().is_empty() {
                bail!("note text must not be empty");
            }
            let id = app.db.add_note(&player.name, date.unwrap_or_else(today), text.trim())?;
            writeln!(out, "Added note #{id} for {}.", player.name)?;
        }
        NoteCommand::List { athlete } => {
            let all = app.db.list_notes()?;
            let shown: Vec<_> = match athlete {
                Some(name) => notes_for(&all, &name),
                None => {
                    let mut v: Vec<_> = all.iter().collect();
                    v.sort_by(|a, b| (b.date, b.id).cmp(&(a.date, a.id)));
                    v
                }
            };
            if shown.is_empty() {
                writeln!(out, "No notes.")?;
            } else {
                write!(out, "{}", render::notes(&shown))?;
            }
        }
        NoteCommand::Remove { id } => {
            if !app.db.delete_note(id)? {
                bail!("note #{id} not found");
            }
            writeln!(out, "Removed note #{id}.")?;
        }
        NoteCommand::Clear { yes } => {
            if !yes {
                bail!("refusing to clear notes without --yes");
            }
            app.db.clear_notes()?;
            warn!("scout notes cleared");
            writeln!(out, "Notes cleared.")?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

fn parse_group(label: &str) -> Result<AgeGroup> {
    AgeGroup::from_label(label).with_context(|| {
        let known: Vec<&str> = AgeGroup::BANDS.iter().map(|g| g.label()).collect();
        format!("unknown age group '{label}' (expected one of: {})", known.join(", "))
    })
}

pub fn thresholds<W: Write>(app: &App, cmd: ThresholdsCommand, out: &mut W) -> Result<()> {
    match cmd {
        ThresholdsCommand::Show { group } => {
            let only = group.as_deref().map(parse_group).transpose()?;
            write!(out, "{}", render::thresholds(&app.thresholds(), only))?;
        }
        ThresholdsCommand::Set {
            group,
            metric,
            below,
            avg,
            above,
        } => {
            let group = parse_group(&group)?;
            let mut table = app.thresholds();
            table.set(group, metric.trim(), Cut::new(below, avg, above))?;
            app.save_thresholds(&table)?;
            writeln!(out, "Set {} for {group}.", metric.trim())?;
        }
        ThresholdsCommand::Export { out: path } => {
            let table = app.thresholds();
            table
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(out, "Exported {} thresholds to {}.", table.len(), path.display())?;
        }
        ThresholdsCommand::Import { csv } => {
            let table = ThresholdTable::load(&csv)
                .with_context(|| format!("rejected threshold file {}", csv.display()))?;
            app.save_thresholds(&table)?;
            info!("imported {} thresholds from {}", table.len(), csv.display());
            writeln!(out, "Imported {} thresholds.", table.len())?;
        }
        ThresholdsCommand::Reset => {
            app.save_thresholds(&ThresholdTable::defaults())?;
            writeln!(out, "Thresholds reset to defaults.")?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Merge and templates
// ---------------------------------------------------------------------------

pub fn merge<W: Write>(
    category: &str,
    files: &[PathBuf],
    labels: &[String],
    dest: Option<PathBuf>,
    out: &mut W,
) -> Result<()> {
    let category = Category::from_str_category(category).with_context(|| format!("unknown category '{category}'"))?;
    if labels.len() > files.len() {
        bail!("{} labels given for {} files", labels.len(), files.len());
    }

    let mut inputs = Vec::with_capacity(files.len());
    for (i, path) in files.iter().enumerate() {
        let table = MeasurementTable::load(path)?;
        let label = labels.get(i).cloned().unwrap_or_else(|| default_label(path));
        inputs.push(MergeInput { label, table });
    }
    let merged = merge_tables(category, inputs);

    let dest = dest.unwrap_or_else(|| PathBuf::from(merged_file_name(category)));
    let file = std::fs::File::create(&dest).with_context(|| format!("failed to create {}", dest.display()))?;
    merged
        .write_csv(file)
        .with_context(|| format!("failed to write {}", dest.display()))?;
    writeln!(out, "Merged {} rows into {}.", merged.len(), dest.display())?;
    Ok(())
}

pub fn template<W: Write>(name: &str, out_dir: &Path, out: &mut W) -> Result<()> {
    let selected: Vec<&Template> = if name.eq_ignore_ascii_case("all") {
        TEMPLATES.iter().collect()
    } else {
        vec![find_template(name).with_context(|| format!("unknown template '{name}'"))?]
    };
    std::fs::create_dir_all(out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;
    for t in selected {
        let path = out_dir.join(t.file_name);
        let file = std::fs::File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        write_template(t, file).with_context(|| format!("failed to write {}", path.display()))?;
        writeln!(out, "Wrote {}.", path.display())?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

pub fn report<W: Write>(app: &App, args: ReportArgs, out: &mut W) -> Result<()> {
    let roster = app.db.list_players()?;
    if roster.is_empty() {
        bail!("roster is empty; import players first");
    }
    let as_of = args.date.unwrap_or_else(today);

    let mut ctx = AppContext::new(roster, app.thresholds(), app.db.list_notes()?);
    ctx.resolution = app.config.resolution.clone();
    ctx.note_placeholder = app.config.report.note_placeholder.clone();

    let sources = [
        (Category::Blast, &args.blast),
        (Category::Flightscope, &args.flightscope),
        (Category::Throwing, &args.throwing),
        (Category::Running, &args.running),
        (Category::Mobility, &args.mobility),
        (Category::Dynamo, &args.dynamo),
    ];
    let mut raw = Vec::new();
    for (category, path) in sources {
        if let Some(path) = path {
            let table = MeasurementTable::load(path)?;
            info!("loaded {} rows of {} data from {}", table.len(), category, path.display());
            raw.push((category, table));
        }
    }

    let mut policy = BindingPolicy::from_settings(&ctx.resolution);
    if args.no_closest {
        policy.accept_closest = false;
    }
    for (from, to) in &args.mappings {
        policy = policy.with_override(from, Decision::Bind(to.clone()));
    }
    for skip in &args.skips {
        policy = policy.with_override(skip, Decision::Skip);
    }

    let (uploads, reports) = ctx.join_uploads(raw, as_of, &policy);
    for line in render::join_warnings(&reports) {
        warn!("{}", line);
        eprintln!("{line}");
    }

    let card = assemble(&ctx, &args.athlete, as_of, &uploads)?;
    if args.json {
        writeln!(out, "{}", card.to_json()?)?;
    } else {
        write!(out, "{}", render::scorecard(&card))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
