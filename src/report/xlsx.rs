//! Serialization of a [`Table`] to a single-sheet xlsx workbook.

use std::path::Path;

use log::{trace, warn};
use rust_xlsxwriter::{ColNum, Format, FormatBorder, RowNum, Workbook, Worksheet, XlsxError};
use thiserror::Error;

use super::{Cell, CellStyle, CellValue, Table};

/// Name of the only sheet in the workbook
pub const SHEET_NAME: &str = "IP Data";
/// Longest string a single xlsx cell can hold, in characters
pub const MAX_CELL_CHARS: usize = 32_767;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("could not write spreadsheet: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("table does not fit in a worksheet: {0}")]
    TooLarge(String),
}

// One format per cell style, created once per workbook
struct Formats {
    header: Format,
    body: Format,
}

impl Formats {
    fn new() -> Self {
        Formats {
            header: Format::new().set_bold().set_border(FormatBorder::Thin),
            body: Format::new().set_border(FormatBorder::Thin),
        }
    }

    fn get(&self, style: CellStyle) -> &Format {
        match style {
            CellStyle::Header => &self.header,
            CellStyle::Body => &self.body,
        }
    }
}

/// Write `table` to a new workbook at `path`, replacing any existing file
pub fn save(table: &Table, path: &Path) -> Result<(), ReportError> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let names = table.header_names();
    for (c, column) in table.columns().iter().enumerate() {
        let col = ColNum::try_from(c)
            .map_err(|_| ReportError::TooLarge(format!("{} columns", table.columns().len())))?;
        for (r, cell) in column.cells().iter().enumerate() {
            let row = RowNum::try_from(r)
                .map_err(|_| ReportError::TooLarge(format!("{} rows", table.height())))?;
            write_cell(sheet, row, col, cell, &formats, names[c])?;
        }
    }

    trace!("Saving workbook to {}", path.display());
    workbook.save(path)?;
    Ok(())
}

fn write_cell(
    sheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    cell: &Cell,
    formats: &Formats,
    header: &str,
) -> Result<(), XlsxError> {
    let format = formats.get(cell.style);
    match &cell.value {
        CellValue::Empty => sheet.write_blank(row, col, format)?,
        CellValue::Text(t) => {
            let text = match truncate(t) {
                Some(cut) => {
                    warn!(
                        "Value in column '{}' row {} is longer than {} characters and was truncated",
                        header, row, MAX_CELL_CHARS
                    );
                    cut
                }
                None => t.as_str(),
            };
            sheet.write_string_with_format(row, col, text, format)?
        }
        CellValue::Number(n) => sheet.write_number_with_format(row, col, *n, format)?,
        CellValue::Bool(b) => sheet.write_boolean_with_format(row, col, *b, format)?,
    };
    Ok(())
}

// The first MAX_CELL_CHARS characters of `s`, or None if it already fits
fn truncate(s: &str) -> Option<&str> {
    s.char_indices().nth(MAX_CELL_CHARS).map(|(end, _)| &s[..end])
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;
    use crate::aggregate::Aggregator;

    #[test]
    fn should_write_workbook() {
        let mut agg = Aggregator::new();
        let record = match json!({"Risk_score": 3, "tags": ["a", "b"], "known": true}) {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        };
        agg.insert("8.8.8.8".parse().unwrap(), record);
        let (results, fields) = agg.finish();
        let table = Table::build(results, &fields);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        save(&table, &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        // xlsx files are zip archives
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn should_write_header_only_workbook() {
        let table = Table::build(Default::default(), &Default::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        save(&table, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn should_truncate_overlong_text() {
        let mut agg = Aggregator::new();
        for (addr, record) in [
            ("8.8.8.8", json!({"Risk_score": 1, "notes": "x".repeat(40_000)})),
            ("1.1.1.1", json!({"Risk_score": 2, "notes": "short"})),
        ] {
            let serde_json::Value::Object(m) = record else {
                unreachable!()
            };
            agg.insert(addr.parse().unwrap(), m);
        }
        let (results, fields) = agg.finish();
        let table = Table::build(results, &fields);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.xlsx");
        save(&table, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn should_cut_on_char_boundary() {
        assert_eq!(truncate("short"), None);
        assert_eq!(truncate(&"a".repeat(MAX_CELL_CHARS)), None);

        let long = "é".repeat(MAX_CELL_CHARS + 10);
        let cut = truncate(&long).unwrap();
        assert_eq!(cut.chars().count(), MAX_CELL_CHARS);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[test]
    fn should_fail_on_unwritable_path() {
        let table = Table::build(Default::default(), &Default::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("report.xlsx");
        assert!(matches!(save(&table, &path), Err(ReportError::Xlsx(_))));
    }
}
