// Combine several exports of one category into a single tagged table.

use std::path::Path;

use tracing::{debug, info};

use crate::category::Category;
use crate::table::{Cell, MeasurementTable, Row};

pub const TYPE_COLUMN: &str = "Type";
pub const LABEL_COLUMN: &str = "Label";

/// One file going into a merge.
#[derive(Debug, Clone)]
pub struct MergeInput {
    pub label: String,
    pub table: MeasurementTable,
}

/// Label for a file when none is given: the file stem.
pub fn default_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Conventional output file name: the display name in snake case, e.g.
/// `merged_running_speed.csv`.
pub fn merged_file_name(category: Category) -> String {
    let stem = category.display_name().to_lowercase().replace(' ', "_");
    format!("merged_{stem}.csv")
}

/// Concatenate `inputs`, tagging each row with `Type` (the category display
/// name) and `Label` (the input's label). An input that already carries a
/// `Type` column (force-plate movement types) keeps its own values. Columns
/// are the union of all inputs in first-seen order; cells an input lacks are
/// left blank. Swing exports
/// without a `Name` column get an empty one in front so names can be filled
/// in by hand.
pub fn merge_tables(category: Category, inputs: Vec<MergeInput>) -> MeasurementTable {
    let mut columns: Vec<String> = Vec::new();
    let mut tagged = Vec::with_capacity(inputs.len());

    for MergeInput { label, mut table } in inputs {
        if category == Category::Blast {
            table.insert_column_front("Name", Cell::Missing);
        }
        let n = table.len();
        if table.resolve_column(TYPE_COLUMN).is_some() {
            debug!("{} input '{}' keeps its own {} column", category, label, TYPE_COLUMN);
        } else {
            let kind = Cell::Text(category.display_name().to_string());
            table.set_column(TYPE_COLUMN, vec![kind; n]);
        }
        table.set_column(LABEL_COLUMN, vec![Cell::Text(label); n]);

        for c in table.columns() {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }
        tagged.push(table);
    }

    let mut merged = MeasurementTable::new(columns);
    for table in tagged {
        for source in table.rows() {
            let mut row = Row::default();
            for c in merged.columns() {
                row.insert(c.clone(), source.get(c).clone());
            }
            merged.push_row(row);
        }
    }
    info!("merged {} rows of {} data", merged.len(), category);
    merged
}
