//! Tabular record sources (xlsx, csv) and the data-entry scaffold.
//!
//! Both sources read eagerly at open time: the whole batch is driven off an
//! in-memory row list, so row order and row count are fixed before the
//! first document is touched.

use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};

use crate::batch::RecordSource;
use crate::error::MergeError;
use crate::record::{CellValue, Record};

fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(_) => CellValue::Invalid,
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => CellValue::Date(naive),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Rows read from the first sheet of an xlsx workbook. The first row is the
/// header; fully-empty rows are skipped.
pub struct XlsxSource {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl XlsxSource {
    pub fn open(path: &Path) -> Result<Self, MergeError> {
        let read_err = |e: &dyn std::fmt::Display| {
            MergeError::SourceRead(format!("{}: {}", path.display(), e))
        };
        let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| read_err(&e))?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| read_err(&"workbook has no sheets"))?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| read_err(&e))?;

        let mut rows_iter = range.rows();
        let columns: Vec<String> = rows_iter
            .next()
            .map(|header| {
                header
                    .iter()
                    .map(|cell| convert_cell(cell).display().unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        let mut rows = Vec::new();
        for row in rows_iter {
            if row.iter().all(|cell| matches!(cell, Data::Empty)) {
                continue;
            }
            let mut record = Record::new();
            for (i, column) in columns.iter().enumerate() {
                let value = row.get(i).map(convert_cell).unwrap_or(CellValue::Empty);
                record.insert(column.clone(), value);
            }
            rows.push(record);
        }

        log::debug!(
            "read {} data rows ({} columns) from {}",
            rows.len(),
            columns.len(),
            path.display()
        );
        Ok(XlsxSource { columns, rows })
    }
}

impl RecordSource for XlsxSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn rows(&self) -> &[Record] {
        &self.rows
    }
}

/// Rows read from a CSV file. Every cell is text; empty fields become
/// [`CellValue::Empty`] so they normalize to the sentinel like blank
/// spreadsheet cells do.
#[derive(Debug)]
pub struct CsvSource {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl CsvSource {
    pub fn open(path: &Path) -> Result<Self, MergeError> {
        let read_err = |e: &dyn std::fmt::Display| {
            MergeError::SourceRead(format!("{}: {}", path.display(), e))
        };
        let mut reader = csv::Reader::from_path(path).map_err(|e| read_err(&e))?;
        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| read_err(&e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| read_err(&e))?;
            let mut row = Record::new();
            for (i, column) in columns.iter().enumerate() {
                let value = match record.get(i) {
                    Some("") | None => CellValue::Empty,
                    Some(field) => CellValue::Text(field.to_string()),
                };
                row.insert(column.clone(), value);
            }
            rows.push(row);
        }
        Ok(CsvSource { columns, rows })
    }
}

impl RecordSource for CsvSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn rows(&self) -> &[Record] {
        &self.rows
    }
}

/// Write the data-entry workbook: one sheet whose bold header row is the
/// atomic token list, ready to be filled in one record per row.
pub fn create_template_workbook(path: &Path, columns: &[String]) -> Result<(), MergeError> {
    use rust_xlsxwriter::{Format, Workbook};

    let save_err = |e: &dyn std::fmt::Display| MergeError::Save {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    for (i, column) in columns.iter().enumerate() {
        sheet
            .write_string_with_format(0, i as u16, column, &bold)
            .map_err(|e| save_err(&e))?;
    }
    workbook.save(path).map_err(|e| save_err(&e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_source_reads_rows_and_blank_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "NAME,DEPT\nAlice,Sales\nBob,\n").unwrap();

        let source = CsvSource::open(&path).unwrap();
        assert_eq!(source.columns(), ["NAME", "DEPT"]);
        assert_eq!(source.rows().len(), 2);
        assert_eq!(
            source.rows()[0]["NAME"],
            CellValue::Text("Alice".to_string())
        );
        assert_eq!(source.rows()[1]["DEPT"], CellValue::Empty);
    }

    #[test]
    fn csv_source_unreadable_path_is_a_source_error() {
        let err = CsvSource::open(Path::new("/nonexistent/data.csv")).unwrap_err();
        assert!(matches!(err, MergeError::SourceRead(_)));
    }

    #[test]
    fn scaffold_then_read_back_round_trips_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.xlsx");
        let columns = vec!["姓名".to_string(), "部门".to_string()];
        create_template_workbook(&path, &columns).unwrap();

        let source = XlsxSource::open(&path).unwrap();
        assert_eq!(source.columns(), columns.as_slice());
        assert!(source.rows().is_empty());
    }
}
