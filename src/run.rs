use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::{
  stats::{self, Millis},
  toolchain::Toolchain,
};

/// Runs the current artifact `iterations` times in sequence and returns the
/// mean wall-clock time of a run.
///
/// # Errors
///
/// This will return an error if:
/// - `iterations` is zero.
/// - any run fails (see [`Toolchain::run`]); the remaining runs are not
///   attempted.
pub fn time_runs<T: Toolchain + ?Sized>(toolchain: &mut T, iterations: u32) -> Result<Millis> {
  let mut samples: Vec<Duration> = Vec::with_capacity(iterations as usize);

  for i in 0..iterations {
    let elapsed = toolchain.run().with_context(|| format!("run {}/{iterations}", i + 1))?;
    samples.push(elapsed);
  }

  let mean = stats::mean(&samples).context("no iterations")?;
  debug!(iterations, mean_ms = mean, "timed artifact");

  Ok(mean)
}
