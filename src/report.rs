//! The CSV report consumed by downstream analysis.
//!
//! Rows for the running category are kept in memory and the whole file is
//! rewritten atomically (temporary file + rename) after every change, so a
//! reader never sees a truncated or half-written report and an interrupted run
//! leaves every row appended so far in place.

use std::{
  fs, io,
  io::Write,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::stats::{self, Millis};

/// Column names, in order. Part of the report's external format.
pub const HEADER: [&str; 5] = [
  "optimization",
  "benchmark_name",
  "time in ms w/ opt",
  "time in ms w/o opt",
  "speedup",
];

/// Comparative timings of one program in one category.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
  pub optimization: String,
  pub benchmark: String,
  pub optimized_ms: Millis,
  pub unoptimized_ms: Millis,
  /// Always `unoptimized_ms / optimized_ms`.
  pub speedup: f64,
}

impl ResultRow {
  /// Returns `None` when the speedup is undefined, i.e. the optimized mean is
  /// not strictly positive.
  pub fn new(optimization: &str, benchmark: &str, optimized_ms: Millis, unoptimized_ms: Millis) -> Option<Self> {
    Some(Self {
      optimization: optimization.to_string(),
      benchmark: benchmark.to_string(),
      optimized_ms,
      unoptimized_ms,
      speedup: stats::speedup(optimized_ms, unoptimized_ms)?,
    })
  }

  pub fn fields(&self) -> [String; 5] {
    [
      self.optimization.clone(),
      self.benchmark.clone(),
      format_number(self.optimized_ms),
      format_number(self.unoptimized_ms),
      format_number(self.speedup),
    ]
  }
}

/// Shortest decimal that round-trips, always with a fractional part for
/// integral values (`6.0`, `0.25`, `11.734`).
pub fn format_number(value: f64) -> String {
  format!("{value:?}")
}

/// Appends one CSV record (CRLF-terminated), quoting fields that need it.
fn write_record<S: AsRef<str>>(out: &mut String, fields: &[S]) {
  for (i, field) in fields.iter().enumerate() {
    if i > 0 {
      out.push(',');
    }

    let field = field.as_ref();
    if field.contains([',', '"', '\r', '\n']) {
      out.push('"');
      out.push_str(&field.replace('"', "\"\""));
      out.push('"');
    } else {
      out.push_str(field);
    }
  }

  out.push_str("\r\n");
}

/// Renders the header followed by `rows`.
pub fn to_csv(rows: &[ResultRow]) -> String {
  let mut csv = String::new();

  write_record(&mut csv, &HEADER);
  for row in rows {
    write_record(&mut csv, &row.fields());
  }

  csv
}

/// The report of the category currently being benchmarked.
pub struct Report {
  path: PathBuf,
  rows: Vec<ResultRow>,
}

impl Report {
  pub fn new(path: PathBuf) -> Self {
    Self { path, rows: Vec::new() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn rows(&self) -> &[ResultRow] {
    &self.rows
  }

  /// Starts over for a new category. The file on disk is left alone until the
  /// next [`commit`](Self::commit) or [`finish`](Self::finish), so resetting
  /// never fails, whether or not a report exists yet.
  pub fn reset(&mut self, category: &str) {
    debug!(category, path = ?self.path, "reset report");
    self.rows.clear();
  }

  /// Adds a row and commits the report.
  pub fn append(&mut self, row: ResultRow) -> Result<()> {
    self.rows.push(row);
    self.commit()
  }

  /// Ends the category. With rows, the report is committed; without any, no
  /// report is left behind, as if the header had never been written.
  pub fn finish(&self) -> Result<()> {
    if !self.rows.is_empty() {
      return self.commit();
    }

    match fs::remove_file(&self.path) {
      Err(err) if err.kind() != io::ErrorKind::NotFound => {
        Err(err).with_context(|| format!("remove {:?}", self.path))
      }
      _ => Ok(()),
    }
  }

  /// Atomically replaces the report file with the header and current rows.
  pub fn commit(&self) -> Result<()> {
    let dir = self.path.parent().context("report has no parent directory")?;

    let mut file = NamedTempFile::new_in(dir).with_context(|| format!("tempfile in {dir:?}"))?;
    file.write_all(to_csv(&self.rows).as_bytes()).context("write")?;
    file.flush().context("flush")?;
    file
      .persist(&self.path)
      .with_context(|| format!("persist {:?}", self.path))?;

    Ok(())
  }
}
