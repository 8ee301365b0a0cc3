//! Append-only CSV store for sensor readings.
//!
//! The store owns a single flat file with the header row
//! `timestamp,temperature,humidity` and one row per accepted reading.
//! The file is created with its header on first append and is never
//! rewritten in place — the only mutation is appending whole rows.
//!
//! # Concurrency discipline
//!
//! Exactly one writer (the ingest consumer) appends; readers take a
//! fresh full snapshot per [`CsvStore::load_all`] call and never
//! mutate. Each row is appended with a single `write_all` on an
//! append-mode handle, so a concurrent reader never observes a
//! visibly truncated row.
//!
//! # Duplicate masking
//!
//! The writer never checks for pre-existing timestamps before
//! appending, so the file can contain true duplicates. `load_all`
//! deduplicates by timestamp, keeping the **first** occurrence in
//! file order — a load-time correctness rule, not a write-time
//! rejection.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::reading::{format_timestamp, parse_timestamp, Reading};

/// Header row written when the store file is created.
pub const HEADER: &str = "timestamp,temperature,humidity";

/// Append-only CSV store holding the persisted reading sequence.
///
/// The store exclusively owns its file path. Construction performs no
/// I/O; the file and header materialize on the first append.
#[derive(Debug, Clone)]
pub struct CsvStore {
    /// Path to the store file.
    path: PathBuf,
}

impl CsvStore {
    /// Creates a store handle for the given file path.
    ///
    /// No I/O happens here: a store pointed at a missing file is valid
    /// and loads as empty.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the path to the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably appends one reading.
    ///
    /// Creates the file and writes the header row first if the file is
    /// absent or empty; reopening an existing store never duplicates
    /// the header or truncates prior data. The row itself goes out in
    /// a single `write_all` so readers never see a partial row, and
    /// the handle is flushed before returning.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Open`] if the file cannot be created or opened
    /// - [`StoreError::Append`] if writing or flushing fails — the
    ///   caller must treat the reading as unhandled, never as stored
    pub fn append(&self, reading: &Reading) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::Open {
                path: self.path.display().to_string(),
                source: e,
            })?;

        let is_empty = file
            .metadata()
            .map(|m| m.len() == 0)
            .map_err(|e| StoreError::Open {
                path: self.path.display().to_string(),
                source: e,
            })?;

        if is_empty {
            file.write_all(format!("{HEADER}\n").as_bytes())
                .map_err(|e| StoreError::Append {
                    path: self.path.display().to_string(),
                    source: e,
                })?;
        }

        let row = format!(
            "{},{},{}\n",
            format_timestamp(reading.timestamp),
            format_cell(reading.temperature),
            format_cell(reading.humidity),
        );

        file.write_all(row.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| StoreError::Append {
                path: self.path.display().to_string(),
                source: e,
            })?;

        tracing::debug!(path = %self.path.display(), row = row.trim_end(), "appended reading");

        Ok(())
    }

    /// Loads every persisted reading as a fresh snapshot, in file order.
    ///
    /// File order approximates arrival order, not timestamp order —
    /// late arrivals stay where they landed. The snapshot is cleaned
    /// on the way in:
    ///
    /// - duplicate timestamps keep the first occurrence only
    /// - numeric cells that fail to parse coerce to `None`
    /// - rows without a parseable timestamp are skipped with a warning
    /// - a missing or empty file yields an empty vector
    ///
    /// Calling this twice without intervening appends returns
    /// identical, order-stable results.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] only for I/O failures other than
    /// the file being absent (e.g. permission denied).
    pub fn load_all(&self) -> Result<Vec<Reading>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.display().to_string(),
                    source: e,
                }
                .into());
            }
        };

        let mut readings = Vec::new();
        let mut seen = HashSet::new();

        for (line_no, line) in contents.lines().enumerate() {
            if line.is_empty() || line == HEADER {
                continue;
            }

            let Some(reading) = parse_row(line) else {
                tracing::warn!(
                    path = %self.path.display(),
                    line = line_no + 1,
                    row = line,
                    "skipping row without a parseable timestamp"
                );
                continue;
            };

            // First occurrence in file order wins.
            if seen.insert(reading.timestamp) {
                readings.push(reading);
            }
        }

        Ok(readings)
    }

    /// Counts rows masked by load-time deduplication.
    ///
    /// Because duplicates are never rejected at write time the file
    /// can grow with rows that `load_all` will never surface; this
    /// makes that growth visible.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`CsvStore::load_all`].
    pub fn masked_duplicates(&self) -> Result<usize> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.display().to_string(),
                    source: e,
                }
                .into());
            }
        };

        let mut seen = HashSet::new();
        let mut masked = 0usize;

        for line in contents.lines() {
            if line.is_empty() || line == HEADER {
                continue;
            }
            let Some(reading) = parse_row(line) else {
                continue;
            };
            if !seen.insert(reading.timestamp) {
                masked += 1;
            }
        }

        Ok(masked)
    }
}

/// Formats an optional measurement as a CSV cell (empty when missing).
fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Parses one CSV row into a reading.
///
/// Returns `None` when the timestamp cell does not parse — a record
/// without an identity cannot participate in deduplication or
/// filtering. Numeric cells that fail to parse coerce to `None`
/// instead of dropping the record.
fn parse_row(line: &str) -> Option<Reading> {
    let mut cells = line.splitn(3, ',');

    let timestamp = parse_timestamp(cells.next()?)?;
    let temperature = cells.next().and_then(parse_cell);
    let humidity = cells.next().and_then(parse_cell);

    Some(Reading::new(timestamp, temperature, humidity))
}

/// Parses a numeric cell, coercing anything unparseable to `None`.
fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}
