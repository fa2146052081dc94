//! Data cleaning: reaction-time outlier filtering and neuro value repair

use thiserror::Error;

use crate::core::table::{Column, ColumnError, DataTable, CATEGORICAL_COLUMNS};

/// Default lower bound for raw reaction times (ms, exclusive)
pub const DEFAULT_RT_LOW: f64 = 200.0;

/// Default upper bound for raw reaction times (ms, exclusive)
pub const DEFAULT_RT_HIGH: f64 = 2000.0;

/// A neuro value that could not be turned into a number
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Cannot parse '{original}' as a number (repaired to '{repaired}')")]
pub struct ParseError {
    /// Text as found in the file
    pub original: String,
    /// Text after whitespace and decimal-point repair
    pub repaired: String,
}

/// Errors raised while cleaning a table
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CleanError {
    #[error("Row {row}: {source}")]
    Parse {
        row: usize,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// Keep only rows whose `column` value lies strictly between `low` and `high`
pub fn filter_outliers(
    table: &DataTable,
    column: &str,
    low: f64,
    high: f64,
) -> Result<DataTable, ColumnError> {
    let values = table.numeric(column)?;
    Ok(table.filter_rows(|r| values[r] > low && values[r] < high))
}

/// Strip whitespace and drop every '.' that has another '.' after it
///
/// Only the last decimal point survives: "1..234" becomes "1.234" and
/// "1.2.3" becomes "12.3".
pub fn repair_text(text: &str) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.rfind('.') {
        Some(last) => compact
            .char_indices()
            .filter(|&(i, c)| c != '.' || i == last)
            .map(|(_, c)| c)
            .collect(),
        None => compact,
    }
}

/// Repair a numeric string and parse it
pub fn repair_numeric_text(text: &str) -> Result<f64, ParseError> {
    let repaired = repair_text(text);
    repaired.parse::<f64>().map_err(|_| ParseError {
        original: text.to_string(),
        repaired,
    })
}

/// Repair the free-text `value` column of a neuro table and re-tag factors
///
/// Tables that are empty or have no `value` column come back unchanged.
pub fn clean_neuro_value(table: &DataTable) -> Result<DataTable, CleanError> {
    if table.is_empty() || !table.has_column("value") {
        return Ok(table.clone());
    }

    let mut cleaned = table.clone();
    let values = match table.column("value")? {
        Column::Numeric(v) => match v.iter().position(|x| x.is_nan()) {
            // A blank or NA cell is not a usable measurement
            Some(row) => {
                return Err(CleanError::Parse {
                    row,
                    source: ParseError {
                        original: String::new(),
                        repaired: String::new(),
                    },
                })
            }
            None => v.clone(),
        },
        other => (0..other.len())
            .map(|row| {
                repair_numeric_text(&other.cell(row))
                    .map_err(|source| CleanError::Parse { row, source })
            })
            .collect::<Result<Vec<f64>, _>>()?,
    };
    cleaned.insert("value", Column::Numeric(values))?;

    for name in CATEGORICAL_COLUMNS {
        let column = cleaned.column(name)?.to_categorical();
        cleaned.insert(*name, column)?;
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::Factor;

    fn neuro_table(values: &[&str]) -> DataTable {
        let n = values.len();
        let ids: Vec<String> = (0..n).map(|i| format!("s{}", i)).collect();
        DataTable::from_columns([
            ("id", Column::Text(ids)),
            ("prime", Column::Categorical(Factor::from_labels(&vec!["Black"; n]))),
            ("target", Column::Categorical(Factor::from_labels(&vec!["gun"; n]))),
            (
                "value",
                Column::Text(values.iter().map(|v| v.to_string()).collect()),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_repair_doubled_decimal() {
        assert_eq!(repair_numeric_text("1..234").unwrap(), 1.234);
    }

    #[test]
    fn test_repair_embedded_whitespace() {
        assert_eq!(repair_numeric_text("12 .5").unwrap(), 12.5);
        assert_eq!(repair_numeric_text(" 0.25\t").unwrap(), 0.25);
    }

    #[test]
    fn test_repair_keeps_only_last_decimal_point() {
        assert_eq!(repair_text("1.2.3"), "12.3");
        assert_eq!(repair_text("..5"), ".5");
        assert_eq!(repair_text("-0..75"), "-0.75");
        assert_eq!(repair_text("42"), "42");
    }

    #[test]
    fn test_repair_rejects_non_numeric() {
        let err = repair_numeric_text("abc").unwrap_err();
        assert_eq!(err.original, "abc");
        assert!(repair_numeric_text("").is_err());
    }

    #[test]
    fn test_filter_outliers_strict_bounds() {
        let table = DataTable::from_columns([(
            "rt_raw",
            Column::Numeric(vec![150.0, 500.0, 1999.0, 2500.0]),
        )])
        .unwrap();
        let kept = filter_outliers(&table, "rt_raw", DEFAULT_RT_LOW, DEFAULT_RT_HIGH).unwrap();
        assert_eq!(kept.numeric("rt_raw").unwrap(), &[500.0, 1999.0]);
        // Input untouched
        assert_eq!(table.n_rows(), 4);
    }

    #[test]
    fn test_filter_outliers_excludes_bounds_themselves() {
        let table = DataTable::from_columns([(
            "rt_raw",
            Column::Numeric(vec![200.0, 2000.0, 201.0]),
        )])
        .unwrap();
        let kept = filter_outliers(&table, "rt_raw", 200.0, 2000.0).unwrap();
        assert_eq!(kept.numeric("rt_raw").unwrap(), &[201.0]);
    }

    #[test]
    fn test_filter_outliers_missing_column() {
        let table = DataTable::empty();
        assert!(filter_outliers(&table, "rt_raw", 200.0, 2000.0).is_err());
    }

    #[test]
    fn test_clean_neuro_value_repairs_and_retags() {
        let cleaned = clean_neuro_value(&neuro_table(&["1..234", "12 .5"])).unwrap();
        assert_eq!(cleaned.numeric("value").unwrap(), &[1.234, 12.5]);
        assert!(cleaned.factor("id").is_ok(), "id is re-tagged as categorical");
    }

    #[test]
    fn test_clean_neuro_value_rejects_blank_numeric_cell() {
        let table = DataTable::from_columns([
            ("id", Column::Categorical(Factor::from_labels(&["1", "2"]))),
            ("value", Column::Numeric(vec![0.5, f64::NAN])),
        ])
        .unwrap();
        match clean_neuro_value(&table).unwrap_err() {
            CleanError::Parse { row, source } => {
                assert_eq!(row, 1);
                assert!(source.original.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_filter_outliers_drops_missing_values() {
        let table =
            DataTable::from_columns([("rt_raw", Column::Numeric(vec![500.0, f64::NAN]))]).unwrap();
        let kept = filter_outliers(&table, "rt_raw", DEFAULT_RT_LOW, DEFAULT_RT_HIGH).unwrap();
        assert_eq!(kept.numeric("rt_raw").unwrap(), &[500.0]);
    }

    #[test]
    fn test_clean_neuro_value_reports_row() {
        let err = clean_neuro_value(&neuro_table(&["0.5", "abc"])).unwrap_err();
        match err {
            CleanError::Parse { row, source } => {
                assert_eq!(row, 1);
                assert_eq!(source.original, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_clean_neuro_value_passes_empty_table() {
        let cleaned = clean_neuro_value(&DataTable::empty()).unwrap();
        assert!(cleaned.is_empty());
    }
}
