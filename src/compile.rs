use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::{
  config::Config,
  discover,
  toolchain::{CompileOutcome, Toolchain},
};

/// Result of building one program with one flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Build {
  /// The artifact is in place and can be timed.
  Ready,
  /// The compiler exited with something other than success or a diagnostic.
  CompileFailed(Option<i32>),
  AssembleFailed,
}

/// Drives the toolchain from program sources to a runnable artifact.
pub struct Driver {
  extension: String,
  /// Standard library sources, appended to every compilation.
  stdlib: Vec<PathBuf>,
}

impl Driver {
  /// Resolves the standard library once, up front.
  pub fn new(config: &Config) -> Result<Self> {
    let stdlib = discover::source_files(&config.stdlib_dir, &config.extension)
      .with_context(|| format!("stdlib {:?}", config.stdlib_dir))?;
    debug!(files = stdlib.len(), "resolved stdlib");

    Ok(Self::with_stdlib(&config.extension, stdlib))
  }

  pub fn with_stdlib(extension: &str, stdlib: Vec<PathBuf>) -> Self {
    Self {
      extension: extension.to_string(),
      stdlib,
    }
  }

  /// The program's own sources followed by the standard library.
  pub fn sources(&self, program: &Path) -> Result<Vec<PathBuf>> {
    let mut sources = if program.is_dir() {
      discover::source_files(program, &self.extension)?
    } else {
      vec![program.to_path_buf()]
    };
    sources.extend(self.stdlib.iter().cloned());

    Ok(sources)
  }

  /// Compiles `program` with `flags` and, unless compilation failed,
  /// assembles it. Any artifact from a previous build is removed first.
  ///
  /// Compile and assembly failures are returned as [`Build`] values; only
  /// errors that make further benchmarking pointless are `Err`.
  pub fn build<T: Toolchain + ?Sized>(&self, toolchain: &mut T, program: &Path, flags: &[String]) -> Result<Build> {
    let sources = self.sources(program).with_context(|| format!("sources of {program:?}"))?;

    toolchain.clean().context("clean")?;

    match toolchain.compile(flags, &sources).context("compile")? {
      CompileOutcome::Success => {}
      CompileOutcome::SuccessWithDiagnostic => {
        debug!(?program, "compiled with a static diagnostic");
      }
      CompileOutcome::Failure(code) => {
        warn!(?program, ?flags, ?code, "compilation failed");

        return Ok(Build::CompileFailed(code));
      }
    }

    if !toolchain.assemble().context("assemble")? {
      warn!(?program, ?flags, "failed to assemble, so it couldn't be run");

      return Ok(Build::AssembleFailed);
    }

    Ok(Build::Ready)
  }
}
