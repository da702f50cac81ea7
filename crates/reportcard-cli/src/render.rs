// Plain-text rendering of scorecards, rosters, notes, and threshold tables.

use std::fmt::Write as _;

use chrono::NaiveDate;
use reportcard_core::athlete::{AgeGroup, Athlete};
use reportcard_core::notes::ScoutNote;
use reportcard_metrics::extract::FORCE_PLATE_COLUMNS;
use reportcard_metrics::resolve::{BindingSource, JoinReport};
use reportcard_metrics::scorecard::Scorecard;
use reportcard_metrics::thresholds::ThresholdTable;

const NA: &str = "N/A";

/// Feet and inches, e.g. `5'10"`.
pub fn format_height(inches: Option<u32>) -> String {
    match inches {
        Some(n) => format!("{}'{}\"", n / 12, n % 12),
        None => NA.to_string(),
    }
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| NA.to_string())
}

fn or_na(s: &str) -> &str {
    if s.trim().is_empty() {
        NA
    } else {
        s
    }
}

fn fmt_value(v: Option<f64>, precision: usize) -> String {
    match v {
        Some(v) => format!("{v:.precision$}"),
        None => NA.to_string(),
    }
}

pub fn scorecard(card: &Scorecard) -> String {
    let p = &card.profile;
    let mut out = String::new();

    let _ = writeln!(out, "{}", p.name);
    let _ = writeln!(
        out,
        "Age {} | {} | {} | B/T {}",
        opt(p.age),
        p.age_group,
        p.position.as_deref().unwrap_or(NA),
        or_na(&p.bats_throws)
    );
    let _ = writeln!(
        out,
        "School {} | Class {} | Height {} | Weight {}",
        or_na(&p.school),
        or_na(&p.class),
        format_height(p.height),
        p.weight.map_or_else(|| NA.to_string(), |w| format!("{w} lbs"))
    );
    let _ = writeln!(out, "Assessment date {}", card.assessment_date);
    let _ = writeln!(out);

    let width = card
        .entries
        .iter()
        .map(|e| e.metric.chars().count())
        .max()
        .unwrap_or(6)
        .max(6);
    let _ = writeln!(out, "{:<width$}  {:>8}  {:<7}  {:<15}  {}", "Metric", "Value", "Tier", "Range", "Spread");
    for e in &card.entries {
        let range = e
            .display_range
            .map_or_else(|| NA.to_string(), |(lo, hi)| format!("{lo:.2} - {hi:.2}"));
        let _ = writeln!(
            out,
            "{:<width$}  {:>8}  {:<7}  {:<15}  {}",
            e.metric,
            e.value_display(2),
            e.tier.label(),
            range,
            fmt_value(e.spread, 2)
        );
    }

    if !card.force_plate.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Force plate");
        let _ = writeln!(out, "  Movement / Type: {}", FORCE_PLATE_COLUMNS.join(" | "));
        for row in &card.force_plate {
            let values: Vec<String> = row.values.iter().map(|v| fmt_value(*v, 1)).collect();
            let _ = writeln!(out, "  {} / {}: {}", row.movement, row.kind, values.join(" | "));
        }
    }

    if !card.flight_points.is_empty() {
        let _ = writeln!(out);
        let measured: Vec<f64> = card.flight_points.iter().filter_map(|p| p.exit_speed).collect();
        let _ = writeln!(
            out,
            "Ball flight: {} located balls ({} with exit speed)",
            card.flight_points.len(),
            measured.len()
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Scout notes: {}", card.latest_note);

    for notice in &card.notices {
        let _ = writeln!(out, "! {notice}");
    }
    out
}

/// One line per unresolved identifier, with suggestions.
pub fn join_warnings(reports: &[JoinReport]) -> Vec<String> {
    let mut lines = Vec::new();
    for r in reports {
        if r.subject_column.is_none() {
            lines.push(format!("{}: no name column found; all rows ignored", r.category));
            continue;
        }
        for b in r.bindings.iter().filter(|b| b.source == BindingSource::Closest) {
            lines.push(format!(
                "{}: '{}' matched to '{}'",
                r.category,
                b.raw,
                b.athlete.as_deref().unwrap_or_default()
            ));
        }
        for b in r.unresolved() {
            let hint = if b.suggestions.is_empty() {
                String::new()
            } else {
                let names: Vec<&str> = b.suggestions.iter().map(|s| s.name.as_str()).collect();
                format!(" (did you mean: {}?)", names.join(", "))
            };
            lines.push(format!(
                "{}: '{}' not on roster, {} rows ignored{}",
                r.category, b.raw, b.rows, hint
            ));
        }
        if r.blank_rows > 0 {
            lines.push(format!("{}: {} rows without a name ignored", r.category, r.blank_rows));
        }
    }
    lines
}

pub fn roster(athletes: &[Athlete], as_of: NaiveDate) -> String {
    let mut out = String::new();
    for a in athletes {
        let _ = writeln!(
            out,
            "{} | DOB {} | Age {} | {} | {} | {}",
            a.name,
            opt(a.dob),
            opt(a.age_on(as_of)),
            a.age_group_on(as_of),
            a.position.map_or(NA, |p| p.display_str()),
            or_na(&a.school)
        );
    }
    out
}

pub fn notes(notes: &[&ScoutNote]) -> String {
    let mut out = String::new();
    for n in notes {
        let _ = writeln!(out, "#{} {} {}: {}", n.id, n.date, n.athlete, n.text);
    }
    out
}

pub fn thresholds(table: &ThresholdTable, only: Option<AgeGroup>) -> String {
    let mut out = String::new();
    for group in table.groups().filter(|g| only.map_or(true, |o| o == *g)) {
        let _ = writeln!(out, "{group}");
        for (metric, cut) in table.metrics(group) {
            let _ = writeln!(
                out,
                "  {:<30} below {:>7} avg {:>7} above {:>7}",
                metric, cut.below_avg, cut.avg, cut.above_avg
            );
        }
    }
    out
}
