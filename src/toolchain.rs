//! The compiler/assembler toolchain under test, seen as opaque executables.

use std::{
  fs, io,
  path::PathBuf,
  process::{Command, Stdio},
  time::Duration,
};

use anyhow::{Context, Result};
use tracing::warn;

use crate::{
  config::Config,
  ext::{CommandExt, ProcessOutcome},
};

/// Exit code with which the compiler reports a static diagnostic while still
/// producing assembly.
pub const DIAGNOSTIC_EXIT_CODE: i32 = 43;

/// How a compiler invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
  Success,
  /// Compiled, but a static diagnostic was reported. Still assembled.
  SuccessWithDiagnostic,
  /// Any other exit; `None` when there was no exit code (signal or timeout).
  Failure(Option<i32>),
}

impl CompileOutcome {
  pub fn from_code(code: Option<i32>) -> Self {
    match code {
      Some(0) => Self::Success,
      Some(DIAGNOSTIC_EXIT_CODE) => Self::SuccessWithDiagnostic,
      code => Self::Failure(code),
    }
  }
}

/// Operations the harness needs from a toolchain.
pub trait Toolchain {
  /// Removes any artifact left over from an earlier build.
  fn clean(&mut self) -> Result<()>;

  /// Compiles `sources` with `flags` placed before them.
  fn compile(&mut self, flags: &[String], sources: &[PathBuf]) -> Result<CompileOutcome>;

  /// Assembles and links the compiler's output. Returns whether a runnable
  /// artifact was produced.
  fn assemble(&mut self) -> Result<bool>;

  /// Runs the artifact once to completion and returns its wall-clock time.
  ///
  /// # Errors
  ///
  /// A run that cannot be started, is killed by a signal, or times out is an
  /// error. The artifact's exit code is not checked.
  fn run(&mut self) -> Result<Duration>;
}

/// A [`Toolchain`] backed by the commands named in a [`Config`].
pub struct ProcessToolchain<'a> {
  config: &'a Config,
}

impl<'a> ProcessToolchain<'a> {
  pub fn new(config: &'a Config) -> Self {
    Self { config }
  }

  fn with_env(&self, mut command: Command) -> Command {
    command.envs(&self.config.env);

    command
  }
}

impl Toolchain for ProcessToolchain<'_> {
  fn clean(&mut self) -> Result<()> {
    match fs::remove_file(&self.config.artifact) {
      Err(err) if err.kind() != io::ErrorKind::NotFound => {
        Err(err).with_context(|| format!("remove {:?}", self.config.artifact))
      }
      _ => Ok(()),
    }
  }

  fn compile(&mut self, flags: &[String], sources: &[PathBuf]) -> Result<CompileOutcome> {
    let mut command = self.with_env(self.config.compiler.command(&self.config.root));
    command.args(flags).args(sources);

    match command.run_timeout(self.config.timeout).context("compiler")? {
      ProcessOutcome::Completed { code, .. } => Ok(CompileOutcome::from_code(code)),
      ProcessOutcome::TimedOut { elapsed } => {
        warn!(?elapsed, "compiler timed out");

        Ok(CompileOutcome::Failure(None))
      }
      ProcessOutcome::SpawnError(err) => {
        Err(err).with_context(|| format!("spawn compiler {:?}", self.config.compiler.program))
      }
    }
  }

  fn assemble(&mut self) -> Result<bool> {
    let mut command = self.with_env(self.config.assembler.command(&self.config.root));

    match command.run_timeout(self.config.timeout).context("assembler")? {
      ProcessOutcome::Completed { code: Some(0), .. } => {
        if self.config.artifact.is_file() {
          Ok(true)
        } else {
          warn!(artifact = ?self.config.artifact, "assembler succeeded but left no artifact");

          Ok(false)
        }
      }
      ProcessOutcome::Completed { code, .. } => {
        warn!(?code, "assembler failed");

        Ok(false)
      }
      ProcessOutcome::TimedOut { elapsed } => {
        warn!(?elapsed, "assembler timed out");

        Ok(false)
      }
      ProcessOutcome::SpawnError(err) => {
        Err(err).with_context(|| format!("spawn assembler {:?}", self.config.assembler.program))
      }
    }
  }

  fn run(&mut self) -> Result<Duration> {
    let artifact = &self.config.artifact;

    let mut command = self.with_env(Command::new(artifact));
    command
      .current_dir(&self.config.root)
      .stdin(Stdio::null())
      .stdout(Stdio::null());

    match command.run_timeout(self.config.timeout).context("artifact")? {
      ProcessOutcome::Completed { code: Some(_), elapsed } => Ok(elapsed),
      ProcessOutcome::Completed { code: None, .. } => anyhow::bail!("{artifact:?} was terminated by a signal"),
      ProcessOutcome::TimedOut { elapsed } => anyhow::bail!("{artifact:?} timed out after {elapsed:?}"),
      ProcessOutcome::SpawnError(err) => Err(err).with_context(|| format!("spawn {artifact:?}")),
    }
  }
}


#[cfg(all(test, unix))]
mod tests {
  use std::path::Path;

  use super::*;
  use crate::config::{EnvVars, Overrides};

  /// A config whose compiler and assembler are `sh` scripts in `root`.
  fn config(root: &Path, compiler: &str, assembler: &str) -> Config {
    fs::write(root.join("joosc.sh"), compiler).unwrap();
    fs::write(root.join("assemble.sh"), assembler).unwrap();

    let mut env = EnvVars::new();
    env.insert("OPTBENCH_COMPILER".into(), format!("sh {}", root.join("joosc.sh").display()));
    env.insert("OPTBENCH_ASSEMBLER".into(), format!("sh {}", root.join("assemble.sh").display()));
    env.insert("OPTBENCH_TIMEOUT".into(), "10".into());
    env.insert("JOOS_MODE".into(), "bench".into());

    Config::resolve(root.to_path_buf(), env, &Overrides::default()).unwrap()
  }

  /// Installs an executable `sh` script as the artifact.
  fn artifact_script(config: &Config, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(&config.artifact, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(&config.artifact, fs::Permissions::from_mode(0o755)).unwrap();
  }

  fn first_existing(candidates: &[&str]) -> PathBuf {
    candidates
      .iter()
      .map(PathBuf::from)
      .find(|path| path.exists())
      .expect("no candidate binary found")
  }

  #[test]
  fn exit_codes_map_to_outcomes() {
    assert_eq!(CompileOutcome::from_code(Some(0)), CompileOutcome::Success);
    assert_eq!(CompileOutcome::from_code(Some(43)), CompileOutcome::SuccessWithDiagnostic);
    assert_eq!(CompileOutcome::from_code(Some(42)), CompileOutcome::Failure(Some(42)));
    assert_eq!(CompileOutcome::from_code(Some(7)), CompileOutcome::Failure(Some(7)));
    assert_eq!(CompileOutcome::from_code(None), CompileOutcome::Failure(None));
  }

  #[test]
  fn compile_passes_flags_then_sources_and_env() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = config(
      root,
      "printf '%s\\n' \"$@\" > args.txt\necho \"$JOOS_MODE\" > mode.txt\nexit 43\n",
      "exit 0\n",
    );
    let mut toolchain = ProcessToolchain::new(&config);

    let flags = vec!["--optimized".to_string(), "loop-unrolling".to_string()];
    let sources = vec![root.join("Loop.java"), root.join("stdlib/Object.java")];
    let outcome = toolchain.compile(&flags, &sources).unwrap();

    assert_eq!(outcome, CompileOutcome::SuccessWithDiagnostic);

    let args = fs::read_to_string(root.join("args.txt")).unwrap();
    let expected = format!(
      "--optimized\nloop-unrolling\n{}\n{}\n",
      sources[0].display(),
      sources[1].display()
    );
    assert_eq!(args, expected);
    assert_eq!(fs::read_to_string(root.join("mode.txt")).unwrap(), "bench\n");
  }

  #[test]
  fn compile_failure_code_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "exit 7\n", "exit 0\n");

    let outcome = ProcessToolchain::new(&config).compile(&[], &[]).unwrap();

    assert_eq!(outcome, CompileOutcome::Failure(Some(7)));
  }

  #[test]
  fn assemble_requires_zero_exit_and_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let config_ok = config(root, "exit 0\n", "touch main\n");
    assert!(ProcessToolchain::new(&config_ok).assemble().unwrap());

    let mut toolchain = ProcessToolchain::new(&config_ok);
    toolchain.clean().unwrap();
    assert!(!root.join("main").exists());

    let config_failing = config(root, "exit 0\n", "touch main\nexit 1\n");
    assert!(!ProcessToolchain::new(&config_failing).assemble().unwrap());

    fs::remove_file(root.join("main")).unwrap();
    let config_no_artifact = config(root, "exit 0\n", "exit 0\n");
    assert!(!ProcessToolchain::new(&config_no_artifact).assemble().unwrap());
  }

  #[test]
  fn clean_without_artifact_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "exit 0\n", "exit 0\n");

    ProcessToolchain::new(&config).clean().unwrap();
  }

  #[test]
  fn run_ignores_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "exit 0\n", "exit 0\n");
    // `sleep` without an operand exits non-zero right away.
    std::os::unix::fs::symlink(first_existing(&["/bin/sleep", "/usr/bin/sleep"]), &config.artifact).unwrap();

    let elapsed = ProcessToolchain::new(&config).run().unwrap();

    assert!(elapsed > Duration::ZERO);
  }

  #[test]
  fn missing_artifact_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "exit 0\n", "exit 0\n");

    assert!(ProcessToolchain::new(&config).run().is_err());
  }

  #[test]
  fn compiler_timeout_is_a_compile_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), "exec sleep 3\n", "exit 0\n");
    config.timeout = Duration::from_secs(1);

    let outcome = ProcessToolchain::new(&config).compile(&[], &[]).unwrap();

    assert_eq!(outcome, CompileOutcome::Failure(None));
  }

  #[test]
  fn assembler_timeout_is_an_assembly_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), "exit 0\n", "touch main\nexec sleep 3\n");
    config.timeout = Duration::from_secs(1);

    assert!(!ProcessToolchain::new(&config).assemble().unwrap());
  }

  #[test]
  fn artifact_killed_by_signal_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "exit 0\n", "exit 0\n");
    artifact_script(&config, "kill -9 $$\n");

    let err = ProcessToolchain::new(&config).run().unwrap_err();

    assert!(err.to_string().contains("terminated by a signal"), "{err:#}");
  }

  #[test]
  fn artifact_timeout_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), "exit 0\n", "exit 0\n");
    config.timeout = Duration::from_secs(1);
    artifact_script(&config, "exec sleep 3\n");

    let err = ProcessToolchain::new(&config).run().unwrap_err();

    assert!(err.to_string().contains("timed out"), "{err:#}");
  }
}
