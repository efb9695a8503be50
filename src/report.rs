//! Rendering of the collected results as a table.
//!
//! The whole table (values and per-cell styles) is built in memory first. Column moves happen on
//! that model and the result is serialized exactly once, see [`xlsx`].

pub mod xlsx;

use std::{collections::BTreeSet, path::Path};

use itertools::Itertools;
use log::{debug, info, warn};
use serde_json::Value;

use crate::aggregate::{FieldUniverse, ResultRecord, ResultSet};

pub use self::xlsx::ReportError;

/// Default location of the report, relative to the working directory
pub const DEFAULT_OUTPUT_FILE: &str = "ip_data.xlsx";
/// Name of the first column. Holds the address itself
pub const IP_COLUMN: &str = "IP";
/// Header of the column that is moved right next to [`IP_COLUMN`]
pub const RISK_SCORE_HEADER: &str = "Risk score";

/// Display name of a field: underscores become spaces
pub fn display_name(field: &str) -> String {
    field.replace('_', " ")
}

/// Inverse of [`display_name()`]
pub fn field_key(header: &str) -> String {
    header.replace(' ', "_")
}

/// Upper-case the first character, `risk score` -> `Risk score`. The rest is left as is
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Column names for a field universe, before capitalization.
/// [`IP_COLUMN`] comes first, the remaining display names follow in alphabetical order.
pub fn headers(fields: &FieldUniverse) -> Vec<String> {
    let mut names = BTreeSet::new();
    for f in fields {
        if f.contains(' ') {
            // "a b" would be looked up as "a_b"
            warn!("Field '{}' contains a space, its values cannot be shown", f);
        }
        if f == IP_COLUMN {
            continue;
        }
        names.insert(display_name(f));
    }
    std::iter::once(IP_COLUMN.to_string())
        .chain(names)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellStyle {
    /// Bold with a thin border
    Header,
    /// Thin border
    Body,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl From<&Value> for CellValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => CellValue::Number(f),
                None => CellValue::Text(n.to_string()),
            },
            Value::String(s) => CellValue::Text(s.to_owned()),
            Value::Array(items) => CellValue::Text(
                items
                    .iter()
                    .map(|i| match i {
                        Value::String(s) => s.to_owned(),
                        other => other.to_string(),
                    })
                    .join(", "),
            ),
            Value::Object(_) => CellValue::Text(v.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

/// A single column: the header cell followed by one cell per row
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    cells: Vec<Cell>,
}

impl Column {
    pub fn header(&self) -> &Cell {
        &self.cells[0]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// The report as a grid of styled cells, stored column by column.
/// Every column has the same number of cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build the table for a result set.
    /// Each record gets its address injected as the `IP` field before its row is rendered.
    pub fn build(results: ResultSet, fields: &FieldUniverse) -> Table {
        let headers = headers(fields);
        let mut columns = headers
            .iter()
            .map(|h| Column {
                cells: vec![Cell {
                    value: CellValue::Text(capitalize(h)),
                    style: CellStyle::Header,
                }],
            })
            .collect::<Vec<_>>();

        for (addr, mut record) in results {
            record.insert(IP_COLUMN.to_string(), Value::String(addr.as_str().to_owned()));
            for (col, header) in columns.iter_mut().zip(&headers) {
                col.cells.push(Cell {
                    value: lookup(&record, header),
                    style: CellStyle::Body,
                });
            }
        }
        debug!(
            "Built table with {} columns and {} rows",
            columns.len(),
            columns.first().map_or(0, |c| c.cells.len())
        );
        Table { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Header texts, in column order
    pub fn header_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| match &c.header().value {
                CellValue::Text(t) => t.as_str(),
                _ => "",
            })
            .collect()
    }

    /// Number of rows including the header row
    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    /// Move the column whose header is exactly `header` to `position`, keeping its cells and styles.
    /// Returns whether such a column exists. Moving a column onto its own position changes nothing.
    pub fn move_column(&mut self, header: &str, position: usize) -> bool {
        let Some(from) = self.header_names().iter().position(|h| *h == header) else {
            return false;
        };
        let col = self.columns.remove(from);
        let to = position.min(self.columns.len());
        self.columns.insert(to, col);
        true
    }

    /// Move the `Risk score` column right after the `IP` column, if there is one.
    /// Headers are matched regardless of case, an exact match wins over `RISK SCORE` and the like.
    pub fn promote_risk_score(&mut self) -> bool {
        let names = self.header_names();
        let Some(header) = names
            .iter()
            .find(|h| **h == RISK_SCORE_HEADER)
            .or_else(|| names.iter().find(|h| h.eq_ignore_ascii_case(RISK_SCORE_HEADER)))
            .map(|h| h.to_string())
        else {
            return false;
        };
        self.move_column(&header, 1)
    }
}

// Value of a column for a record. Missing fields are empty
fn lookup(record: &ResultRecord, header: &str) -> CellValue {
    record
        .get(&field_key(header))
        .map_or(CellValue::Empty, CellValue::from)
}

/// Build, reorder and save the report for a result set. Returns the table that was written.
pub fn write_report(
    results: ResultSet,
    fields: &FieldUniverse,
    path: &Path,
) -> Result<Table, ReportError> {
    let mut table = Table::build(results, fields);
    if table.promote_risk_score() {
        debug!("Moved '{}' to the second column", RISK_SCORE_HEADER);
    }
    xlsx::save(&table, path)?;
    info!(
        "Data has been written to {} ({} rows)",
        path.display(),
        table.height().saturating_sub(1)
    );
    Ok(table)
}
