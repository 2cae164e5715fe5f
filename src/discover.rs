use std::{
  ffi::OsStr,
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Names of the optimization categories under `benchmarks_dir`, sorted.
///
/// Every immediate subdirectory is a category, except an entry named like the
/// report. Plain files are not categories.
pub fn categories(benchmarks_dir: &Path, report_name: &str) -> Result<Vec<String>> {
  let mut categories = Vec::new();

  for entry in fs::read_dir(benchmarks_dir).with_context(|| format!("read dir {benchmarks_dir:?}"))? {
    let entry = entry.context("dir entry")?;
    let name = entry.file_name().to_string_lossy().into_owned();

    if name == report_name {
      continue;
    }

    if !entry.file_type().context("file type")?.is_dir() {
      debug!(?name, "skipping non-directory in benchmarks root");
      continue;
    }

    categories.push(name);
  }

  categories.sort();

  Ok(categories)
}

/// Benchmark programs of one category: every immediate child, sorted. An entry
/// is either a single source file or a directory of sources.
pub fn programs(category_dir: &Path) -> Result<Vec<PathBuf>> {
  let mut programs = fs::read_dir(category_dir)
    .with_context(|| format!("read dir {category_dir:?}"))?
    .map(|entry| Ok(entry?.path()))
    .collect::<Result<Vec<_>>>()?;

  programs.sort();

  Ok(programs)
}

/// The name a program is reported under: the directory name for multi-file
/// programs, the file stem otherwise.
pub fn program_name(program: &Path) -> Result<String> {
  let name = if program.is_dir() {
    program.file_name()
  } else {
    program.file_stem()
  };

  Ok(name.context("program name")?.to_string_lossy().into_owned())
}

/// All files under `dir` (recursively) with the given extension, sorted.
pub fn source_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
  let mut files = Vec::new();

  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.with_context(|| format!("walk {dir:?}"))?;

    if entry.file_type().is_file() && entry.path().extension() == Some(OsStr::new(extension)) {
      files.push(entry.into_path());
    }
  }

  Ok(files)
}
