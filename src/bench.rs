use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
  compile::{Build, Driver},
  config::Config,
  discover,
  report::{Report, ResultRow},
  run,
  stats::Millis,
  toolchain::Toolchain,
};

/// Results of one category, in program order.
pub struct CategoryResults {
  pub category: String,
  pub rows: Vec<ResultRow>,
}

pub struct Bench<'a, T> {
  config: &'a Config,
  toolchain: T,
  driver: Driver,
  /// Report of the category being benchmarked.
  report: Report,
}

impl<'a, T: Toolchain> Bench<'a, T> {
  pub fn new(config: &'a Config, toolchain: T) -> Result<Self> {
    let driver = Driver::new(config).context("Driver::new")?;

    Ok(Self {
      config,
      toolchain,
      driver,
      report: Report::new(config.report_path()),
    })
  }

  /// Benchmarks every category, or only those in `only` when it is non-empty.
  pub fn bench(&mut self, only: &[String]) -> Result<Vec<CategoryResults>> {
    let mut categories = discover::categories(&self.config.benchmarks_dir, &self.config.report_name)
      .context("discover categories")?;

    if !only.is_empty() {
      if let Some(unknown) = only.iter().find(|name| !categories.contains(*name)) {
        anyhow::bail!("unknown category {unknown:?}, expected one of {categories:?}");
      }
      categories.retain(|category| only.contains(category));
    }

    let mut results = Vec::with_capacity(categories.len());
    for category in categories {
      let rows = self
        .bench_category(&category)
        .with_context(|| format!("category {category}"))?;

      results.push(CategoryResults { category, rows });
    }

    Ok(results)
  }

  /// Benchmarks every program of `category` unoptimized and optimized,
  /// recording a row for each program where both builds could be timed.
  pub fn bench_category(&mut self, category: &str) -> Result<Vec<ResultRow>> {
    let config = self.config;
    info!(category, "benchmarking");
    self.report.reset(category);

    let category_dir = config.benchmarks_dir.join(category);
    for program in discover::programs(&category_dir).context("programs")? {
      let name = discover::program_name(&program)?;

      info!(category, program = %name, "compiling without optimization");
      let unoptimized = self.cycle(&program, &config.unoptimized_flags)?;

      let optimized_flags = config.optimized_flags(category);
      info!(category, program = %name, "compiling with {category} optimization");
      let optimized = self.cycle(&program, &optimized_flags)?;

      let (Some(optimized), Some(unoptimized)) = (optimized, unoptimized) else {
        warn!(category, program = %name, "no result recorded, a build failed");
        continue;
      };

      let Some(row) = ResultRow::new(category, &name, optimized, unoptimized) else {
        warn!(category, program = %name, optimized, "optimized run took no time, speedup undefined");
        continue;
      };

      info!(category, program = %name, speedup = row.speedup, "recorded");
      self.report.append(row).context("append row")?;
    }

    self.report.finish().context("finish report")?;
    info!(category, report = ?self.report.path(), "done");

    Ok(self.report.rows().to_vec())
  }

  /// Builds `program` with `flags` and times it. `None` if it could not be
  /// built.
  fn cycle(&mut self, program: &Path, flags: &[String]) -> Result<Option<Millis>> {
    match self.driver.build(&mut self.toolchain, program, flags)? {
      Build::Ready => {}
      Build::CompileFailed(_) | Build::AssembleFailed => return Ok(None),
    }

    info!(iterations = self.config.iterations, "running program");
    let mean = run::time_runs(&mut self.toolchain, self.config.iterations)
      .with_context(|| format!("time {program:?}"))?;
    info!(mean_ms = mean, "finished running program");

    Ok(Some(mean))
  }
}
