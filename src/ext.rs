use std::{
  io,
  process::{Child, Command, ExitStatus},
  time::{Duration, Instant},
};

use anyhow::{Context, Result};
use wait_timeout::ChildExt as WaitExt;

/// How a single blocking subprocess invocation ended.
#[derive(Debug)]
pub enum ProcessOutcome {
  /// The process exited on its own. `code` is `None` when it was terminated by
  /// a signal.
  Completed { code: Option<i32>, elapsed: Duration },
  /// The process outlived its timeout and was killed.
  TimedOut { elapsed: Duration },
  /// The process could not be started at all.
  SpawnError(io::Error),
}

#[extend::ext]
pub impl Child {
  /// Waits for the child to exit. On timeout, the child is killed and reaped,
  /// and `Ok(None)` is returned.
  fn wait_or_kill(&mut self, timeout: Duration) -> Result<Option<ExitStatus>> {
    let Some(status) = self.wait_timeout(timeout).context("wait")? else {
      self.kill().context("kill after timeout")?;
      self.wait().context("reap after kill")?;

      return Ok(None);
    };

    Ok(Some(status))
  }
}

#[extend::ext]
pub impl Command {
  /// Spawns the command and blocks until it exits or `timeout` elapses,
  /// measuring wall-clock time from just before the spawn.
  ///
  /// # Errors
  ///
  /// Only a failure to wait on (or kill) an already running child is an error;
  /// a failure to spawn is reported as [`ProcessOutcome::SpawnError`].
  fn run_timeout(&mut self, timeout: Duration) -> Result<ProcessOutcome> {
    let start = Instant::now();

    let mut child = match self.spawn() {
      Ok(child) => child,
      Err(err) => return Ok(ProcessOutcome::SpawnError(err)),
    };

    let outcome = match child.wait_or_kill(timeout)? {
      Some(status) => ProcessOutcome::Completed {
        code: status.code(),
        elapsed: start.elapsed(),
      },
      None => ProcessOutcome::TimedOut {
        elapsed: start.elapsed(),
      },
    };

    Ok(outcome)
  }
}
