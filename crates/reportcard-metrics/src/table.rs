// Measurement tables: device CSV exports held as typed open-schema rows.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

/// Appended by the join step: normalized canonical name of the athlete a row
/// belongs to, or missing when the row's subject could not be resolved.
pub const KEY_COLUMN: &str = "Athlete Key";
/// Appended by the join step: athlete age on the assessment date.
pub const AGE_COLUMN: &str = "Age";
/// Appended by the join step: athlete age-group label.
pub const AGE_GROUP_COLUMN: &str = "Age Group";

/// Columns owned by the join step rather than by the uploaded file.
pub const JOIN_COLUMNS: [&str; 3] = [KEY_COLUMN, AGE_COLUMN, AGE_GROUP_COLUMN];

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A single CSV cell after parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

static MISSING: Cell = Cell::Missing;

impl Cell {
    /// Interpret a raw CSV field. Blank fields are missing; anything that
    /// parses as a finite number is a number; everything else is text.
    /// Non-finite numbers (`NaN`, `inf`) count as missing.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Number(v),
            Ok(_) => Cell::Missing,
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    /// Numeric value, or `None` for text and missing cells.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text form of the cell; numbers are formatted, missing is `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Number(v) => Some(v.to_string()),
            Cell::Text(s) => Some(s.clone()),
            Cell::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    fn to_field(&self) -> String {
        self.as_text().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One row: column name to cell. Columns absent from the map read as missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    cells: HashMap<String, Cell>,
}

impl Row {
    pub fn get(&self, column: &str) -> &Cell {
        self.cells.get(column).unwrap_or(&MISSING)
    }

    pub fn insert(&mut self, column: impl Into<String>, cell: Cell) {
        self.cells.insert(column.into(), cell);
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

/// An uploaded measurement table. Column order is preserved; rows are open
/// maps so no column is assumed to exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasurementTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl MeasurementTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: dedupe_columns(columns),
            rows: Vec::new(),
        }
    }

    /// Build a table from string columns and raw string rows. Used by tests
    /// and by callers that already hold parsed CSV data.
    pub fn from_records<S: AsRef<str>>(columns: &[S], records: &[Vec<&str>]) -> Self {
        let mut table = Self::new(columns.iter().map(|c| c.as_ref().to_string()).collect());
        for record in records {
            table.push_raw(record.iter().copied());
        }
        table
    }

    /// Append a row of raw fields, matched to columns by position. Short rows
    /// are padded with missing cells; surplus fields are dropped.
    pub fn push_raw<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) {
        let mut row = Row::default();
        let mut fields = fields.into_iter();
        for column in &self.columns {
            let cell = fields.next().map(Cell::parse).unwrap_or(Cell::Missing);
            row.insert(column.clone(), cell);
        }
        if fields.next().is_some() {
            debug!("dropping surplus fields beyond {} columns", self.columns.len());
        }
        self.rows.push(row);
    }

    /// Append an already-built row. Cells for unknown columns are kept in the
    /// row but are not visible through `columns()`.
    pub fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// First column whose lowercased name satisfies `pred`.
    pub fn find_column(&self, pred: impl Fn(&str) -> bool) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| pred(&c.to_lowercase()))
            .map(String::as_str)
    }

    /// Look a column up by exact name, falling back to a case-insensitive
    /// match.
    pub fn resolve_column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.as_str() == name)
            .or_else(|| self.columns.iter().find(|c| c.eq_ignore_ascii_case(name)))
            .map(String::as_str)
    }

    /// Numeric values of `column`, skipping missing and non-numeric cells.
    pub fn numeric_values(&self, column: &str) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|r| r.get(column).as_number())
            .collect()
    }

    /// Set `column` to `cells` (one per row), appending the column if it is
    /// new and overwriting it otherwise.
    pub fn set_column(&mut self, column: &str, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.rows.len());
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.insert(column, cell);
        }
    }

    /// Insert a column at the front, filling every row with `fill`. No-op if
    /// the column already exists.
    pub fn insert_column_front(&mut self, column: &str, fill: Cell) {
        if self.has_column(column) {
            return;
        }
        self.columns.insert(0, column.to_string());
        for row in &mut self.rows {
            row.insert(column, fill.clone());
        }
    }

    /// New table holding the rows that satisfy `pred`.
    pub fn filter(&self, pred: impl Fn(&Row) -> bool) -> MeasurementTable {
        MeasurementTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| pred(r)).cloned().collect(),
        }
    }

    // -- CSV I/O --

    /// Parse CSV bytes. Input that is not valid UTF-8 is decoded as Latin-1,
    /// which keeps every byte and never fails.
    pub fn from_reader<R: Read>(mut rdr: R) -> Result<Self, csv::Error> {
        let mut bytes = Vec::new();
        rdr.read_to_end(&mut bytes).map_err(csv::Error::from)?;
        let text = decode(bytes);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut table = MeasurementTable::new(headers);

        for result in reader.records() {
            match result {
                Ok(record) => {
                    if record.iter().all(|f| f.trim().is_empty()) {
                        continue;
                    }
                    table.push_raw(record.iter());
                }
                Err(e) => warn!("skipping malformed CSV row: {}", e),
            }
        }
        Ok(table)
    }

    /// Load a CSV file.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let file = std::fs::File::open(path).map_err(|e| TableError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file).map_err(|e| TableError::Csv {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, w: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(w);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(self.columns.iter().map(|c| row.get(c).to_field()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// UTF-8 when possible, Latin-1 otherwise.
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            warn!("CSV is not valid UTF-8; decoding as Latin-1");
            e.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

/// Disambiguate repeated header names by suffixing `.1`, `.2`, ...
fn dedupe_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(columns.len());
    for c in columns {
        let mut name = c.clone();
        while let Some(n) = seen.get(&name).copied() {
            seen.insert(name.clone(), n + 1);
            name = format!("{c}.{}", n + 1);
        }
        seen.insert(name.clone(), 0);
        out.push(name);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
