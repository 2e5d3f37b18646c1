//! Tabular cell values and per-row normalization.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::error::MergeError;

/// Placeholder written wherever a row has no usable value for a token.
pub const MISSING_SENTINEL: &str = "N/A";

/// One cell of source data, as typed by the spreadsheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
    Empty,
    /// Spreadsheet error cells (`#DIV/0!` and friends) and other
    /// not-a-number markers.
    Invalid,
}

impl CellValue {
    /// Display string for this cell, or `None` when the sentinel applies
    /// (empty, blank after trim, NaN, error cell).
    pub fn display(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => {
                if s.trim().is_empty() {
                    None
                } else {
                    Some(s.clone())
                }
            }
            CellValue::Number(n) => {
                if n.is_nan() {
                    None
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(format!("{}", n))
                }
            }
            CellValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            CellValue::Date(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    Some(dt.format("%Y-%m-%d").to_string())
                } else {
                    Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
                }
            }
            CellValue::Empty | CellValue::Invalid => None,
        }
    }
}

/// One row of source data, keyed by column name.
pub type Record = HashMap<String, CellValue>;

/// Token name -> display string, covering exactly the atomic token list.
pub type NormalizedRecord = HashMap<String, String>;

/// Resolve every atomic token against one data row.
///
/// Fails with [`MergeError::MissingColumn`] on the first token that has no
/// column in the row; no partial map is produced. Missing and blank values
/// become [`MISSING_SENTINEL`].
pub fn normalize_record(record: &Record, tokens: &[String]) -> Result<NormalizedRecord, MergeError> {
    let mut normalized = NormalizedRecord::with_capacity(tokens.len());
    for token in tokens {
        let value = record
            .get(token)
            .ok_or_else(|| MergeError::MissingColumn(token.clone()))?;
        normalized.insert(
            token.clone(),
            value
                .display()
                .unwrap_or_else(|| MISSING_SENTINEL.to_string()),
        );
    }
    Ok(normalized)
}
