//! CSV input parsing
//!
//! Turns a delimited file into [`Record`]s. Rows that cannot become a record
//! are collected as [`RowError`]s instead of aborting the whole parse, so the
//! caller decides whether a partially readable file is acceptable.

use crate::error::{Error, Result};
use crate::types::Record;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Number of columns every data row must have
pub const COLUMN_COUNT: usize = 13;

/// A row that could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based line in the source file
    pub line: u64,
    /// What was wrong with the row
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Records and row problems from one input file
#[derive(Debug, Default)]
pub struct ParsedInput {
    /// Rows that parsed, in file order
    pub records: Vec<Record>,
    /// Rows that did not
    pub errors: Vec<RowError>,
}

/// Parse the CSV file at `path`
pub fn parse_csv_path(path: &Path) -> Result<ParsedInput> {
    let file = File::open(path).map_err(|e| {
        Error::Config(format!("cannot open input file {}: {e}", path.display()))
    })?;
    let parsed = parse_reader(file)?;
    debug!(
        path = %path.display(),
        records = parsed.records.len(),
        errors = parsed.errors.len(),
        "Parsed input file"
    );
    Ok(parsed)
}

/// Parse CSV data with a header row
pub fn parse_reader<R: Read>(reader: R) -> Result<ParsedInput> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    if reader.headers()?.is_empty() {
        return Err(Error::Config("input file has no header row".to_string()));
    }

    let mut parsed = ParsedInput::default();
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            // Quoting problems are per-row; anything else (I/O) ends the parse.
            Err(e) => match e.position() {
                Some(pos) if !e.is_io_error() => {
                    warn!(line = pos.line(), error = %e, "Skipping unreadable row");
                    parsed.errors.push(RowError {
                        line: pos.line(),
                        message: e.to_string(),
                    });
                    continue;
                }
                _ => return Err(e.into()),
            },
        };

        let line = row.position().map_or(0, csv::Position::line);
        if row.iter().all(str::is_empty) {
            continue;
        }
        match to_record(&row) {
            Some(record) => parsed.records.push(record),
            None => {
                warn!(line, fields = row.len(), "Skipping short row");
                parsed.errors.push(RowError {
                    line,
                    message: format!(
                        "expected {COLUMN_COUNT} columns, found {}",
                        row.len()
                    ),
                });
            }
        }
    }

    Ok(parsed)
}

fn to_record(row: &StringRecord) -> Option<Record> {
    if row.len() < COLUMN_COUNT {
        return None;
    }
    let field = |i: usize| row.get(i).unwrap_or_default().to_string();
    let line = row.position().map_or(0, csv::Position::line);

    Some(Record {
        row: usize::try_from(line).unwrap_or(usize::MAX),
        title: field(0),
        description: field(1),
        assignee: field(2),
        iteration_path: field(3),
        area_path: field(4),
        original_estimate: field(5),
        remaining_work: field(6),
        parent: field(7),
        organization: field(8),
        project: field(9),
        area: field(10),
        principal: field(11),
        credential: field(12),
    })
}
