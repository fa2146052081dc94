//! In-memory tabular data
//!
//! A `DataTable` is an ordered list of named columns of equal length.
//! Columns are categorical (sorted level labels plus per-row codes),
//! numeric (`f64`) or free text.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Column names that are always treated as categorical labels
pub const CATEGORICAL_COLUMNS: &[&str] = &["id", "prime", "target"];

/// Cell texts read as a missing number
pub const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null"];

/// Parse one cell of a numeric column; missing markers become NaN
fn parse_numeric_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if MISSING_MARKERS.contains(&cell) {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

/// Errors raised when a table does not have the expected shape
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("Column '{0}' not found")]
    Missing(String),

    #[error("Column '{column}' is {actual}, expected {expected}")]
    WrongKind {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Column '{column}' has {actual} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// A categorical column: sorted distinct labels and one code per row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factor {
    levels: Vec<String>,
    codes: Vec<usize>,
}

impl Factor {
    /// Build a factor from raw labels
    ///
    /// Levels are sorted lexicographically, or numerically when every label
    /// is a number (so subject ids 1, 2, 10 keep their natural order).
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut levels: Vec<String> = labels
            .iter()
            .map(|l| l.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let numeric: Option<Vec<f64>> = levels.iter().map(|l| l.parse::<f64>().ok()).collect();
        if let Some(keys) = numeric {
            let mut paired: Vec<(f64, String)> = keys.into_iter().zip(levels).collect();
            paired.sort_by(|a, b| a.0.total_cmp(&b.0));
            levels = paired.into_iter().map(|(_, l)| l).collect();
        }
        let index: HashMap<&str, usize> = levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();
        let codes = labels
            .iter()
            .map(|l| index.get(l.as_ref()).copied().unwrap_or_default())
            .collect();
        Self { levels, codes }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Label of row `row`
    pub fn label(&self, row: usize) -> &str {
        &self.levels[self.codes[row]]
    }

    /// Number of distinct levels
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Keep only the selected rows; unused levels are dropped
    fn select(&self, rows: &[usize]) -> Self {
        let labels: Vec<&str> = rows.iter().map(|&r| self.label(r)).collect();
        Self::from_labels(&labels)
    }
}

/// A single column of a table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "lowercase")]
pub enum Column {
    Categorical(Factor),
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Categorical(f) => f.len(),
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Column::Categorical(_) => "categorical",
            Column::Numeric(_) => "numeric",
            Column::Text(_) => "text",
        }
    }

    /// Render a single cell back to text
    pub fn cell(&self, row: usize) -> String {
        match self {
            Column::Categorical(f) => f.label(row).to_string(),
            Column::Numeric(v) if v[row].is_nan() => String::new(),
            Column::Numeric(v) => v[row].to_string(),
            Column::Text(v) => v[row].clone(),
        }
    }

    /// The column's values as a factor, converting labels when needed
    pub fn to_factor(&self) -> Factor {
        match self {
            Column::Categorical(f) => f.clone(),
            _ => {
                let labels: Vec<String> = (0..self.len()).map(|r| self.cell(r)).collect();
                Factor::from_labels(&labels)
            }
        }
    }

    /// Re-interpret the column as categorical labels
    pub fn to_categorical(&self) -> Column {
        Column::Categorical(self.to_factor())
    }

    fn select(&self, rows: &[usize]) -> Column {
        match self {
            Column::Categorical(f) => Column::Categorical(f.select(rows)),
            Column::Numeric(v) => Column::Numeric(rows.iter().map(|&r| v[r]).collect()),
            Column::Text(v) => Column::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }
}

/// Ordered collection of named, equal-length columns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTable {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl DataTable {
    /// An empty, schema-less table
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from `(name, column)` pairs
    pub fn from_columns<I, S>(columns: I) -> Result<Self, ColumnError>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut table = Self::empty();
        for (name, column) in columns {
            table.insert(name, column)?;
        }
        Ok(table)
    }

    /// Build a table from string cells, applying the loader's typing rules:
    /// `id`/`prime`/`target` become categorical, columns of numbers and
    /// missing markers become numeric (missing cells as NaN) and everything
    /// else stays text. A column with no actual number stays text.
    pub fn from_records(headers: &[String], records: &[Vec<String>]) -> Self {
        let mut table = Self::empty();
        for (idx, header) in headers.iter().enumerate() {
            let cells: Vec<&str> = records
                .iter()
                .map(|r| r.get(idx).map(String::as_str).unwrap_or(""))
                .collect();
            let column = if CATEGORICAL_COLUMNS.contains(&header.as_str()) {
                Column::Categorical(Factor::from_labels(&cells))
            } else {
                let parsed: Option<Vec<f64>> =
                    cells.iter().map(|c| parse_numeric_cell(c)).collect();
                match parsed {
                    Some(values) if values.iter().any(|v| !v.is_nan()) => {
                        Column::Numeric(values)
                    }
                    _ => Column::Text(cells.iter().map(|c| c.to_string()).collect()),
                }
            };
            table.names.push(header.clone());
            table.columns.push(column);
        }
        table
    }

    /// Add or replace a column
    pub fn insert(&mut self, name: impl Into<String>, column: Column) -> Result<(), ColumnError> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(ColumnError::LengthMismatch {
                column: name,
                expected: self.n_rows(),
                actual: column.len(),
            });
        }
        match self.names.iter().position(|n| *n == name) {
            Some(idx) => self.columns[idx] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows (a schema-less table is empty too)
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, ColumnError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| ColumnError::Missing(name.to_string()))
    }

    pub fn numeric(&self, name: &str) -> Result<&[f64], ColumnError> {
        match self.column(name)? {
            Column::Numeric(v) => Ok(v),
            other => Err(ColumnError::WrongKind {
                column: name.to_string(),
                expected: "numeric",
                actual: other.kind(),
            }),
        }
    }

    pub fn factor(&self, name: &str) -> Result<&Factor, ColumnError> {
        match self.column(name)? {
            Column::Categorical(f) => Ok(f),
            other => Err(ColumnError::WrongKind {
                column: name.to_string(),
                expected: "categorical",
                actual: other.kind(),
            }),
        }
    }

    /// Any column viewed as a factor (numeric and text cells become labels)
    pub fn grouping(&self, name: &str) -> Result<Factor, ColumnError> {
        self.column(name).map(Column::to_factor)
    }

    /// Columns in order, paired with their names
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// New table containing only the rows for which `keep` returns true
    pub fn filter_rows<F>(&self, mut keep: F) -> DataTable
    where
        F: FnMut(usize) -> bool,
    {
        let rows: Vec<usize> = (0..self.n_rows()).filter(|&r| keep(r)).collect();
        self.select_rows(&rows)
    }

    /// New table made of the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> DataTable {
        DataTable {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
        }
    }

    /// Serialize as CSV text
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.names)?;
        for row in 0..self.n_rows() {
            writer.write_record(self.columns.iter().map(|c| c.cell(row)))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
