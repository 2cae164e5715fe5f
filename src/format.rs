use std::fmt::Write;

use anyhow::Result;

use crate::report::ResultRow;

const COLUMN_WIDTH: usize = 14;
const COLUMN_PADDING: &str = "  ";

fn format_header() -> String {
  let header = ["benchmark", "opt (ms)", "no opt (ms)", "speedup"]
    .into_iter()
    .enumerate()
    .map(|(i, col)| {
      if i == 0 {
        format!("{col:<COLUMN_WIDTH$}")
      } else {
        format!("{col:>COLUMN_WIDTH$}")
      }
    })
    .collect::<Vec<_>>()
    .join(COLUMN_PADDING);

  format!("{header}\n{}", "=".repeat(header.len()))
}

fn format_row(row: &ResultRow) -> String {
  [
    format!("{:<COLUMN_WIDTH$}", row.benchmark),
    format!("{:>COLUMN_WIDTH$.3}", row.optimized_ms),
    format!("{:>COLUMN_WIDTH$.3}", row.unoptimized_ms),
    format!("{:>w$}", format!("{:.2}x", row.speedup), w = COLUMN_WIDTH),
  ]
  .join(COLUMN_PADDING)
}

/// Renders a category's rows as a table for the terminal.
pub fn format(category: &str, rows: &[ResultRow]) -> Result<String> {
  let mut table = String::new();

  writeln!(table, "{category}")?;
  writeln!(table, "{}", "=".repeat(category.len()))?;
  writeln!(table)?;

  writeln!(table, "{}", format_header())?;
  if rows.is_empty() {
    writeln!(table, "(no results)")?;
  }
  for row in rows {
    writeln!(table, "{}", format_row(row))?;
  }

  Ok(table)
}
