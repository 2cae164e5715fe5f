//! Harness configuration: the environment file and the resolved [`Config`]
//! that every component borrows.

use std::{
  collections::BTreeMap,
  fs, io,
  path::{Path, PathBuf},
  process::Command,
  str::FromStr,
  time::Duration,
};

use anyhow::{Context, Result};
use tracing::debug;

pub const DEFAULT_ITERATIONS: u32 = 100;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

const ENV_FILE: &str = ".env";

/// Entries of an environment file, in key order.
pub type EnvVars = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
  #[error("failed to read {path:?}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("{path:?}:{line}: expected exactly one KEY=VALUE pair, got {content:?}")]
  Malformed { path: PathBuf, line: usize, content: String },
}

/// Parses the contents of an environment file.
///
/// Blank lines and lines starting with `#` (after leading whitespace) are
/// skipped. Every other line, stripped of surrounding whitespace, must contain
/// exactly one `=`; the key and value on either side are kept verbatim. A
/// later line for the same key wins.
pub fn parse_env(path: &Path, contents: &str) -> Result<EnvVars, EnvError> {
  let mut vars = EnvVars::new();

  for (idx, line) in contents.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }

    let mut parts = line.split('=');
    let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
      return Err(EnvError::Malformed {
        path: path.to_path_buf(),
        line: idx + 1,
        content: line.to_string(),
      });
    };

    vars.insert(key.to_string(), value.to_string());
  }

  Ok(vars)
}

pub fn load_env_file(path: &Path) -> Result<EnvVars, EnvError> {
  let contents = fs::read_to_string(path).map_err(|source| EnvError::Io {
    path: path.to_path_buf(),
    source,
  })?;

  parse_env(path, &contents)
}

/// An external tool invocation: a program followed by fixed leading arguments,
/// written on one line separated by whitespace (e.g. `python3 ./joosc.py`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
  pub program: String,
  pub args: Vec<String>,
}

impl FromStr for ToolCommand {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self> {
    let mut words = s.split_whitespace().map(str::to_string);
    let program = words.next().context("empty command line")?;

    Ok(Self {
      program,
      args: words.collect(),
    })
  }
}

impl ToolCommand {
  /// Builds a [`Command`] running in `root`. A relative program path that
  /// names a directory component (`./joosc`) is resolved against `root`; a bare
  /// name (`nasm`) is left to `PATH` lookup.
  pub fn command(&self, root: &Path) -> Command {
    let program = Path::new(&self.program);
    let mut command = if program.is_relative() && program.components().count() > 1 {
      Command::new(root.join(program))
    } else {
      Command::new(program)
    };

    command.args(&self.args).current_dir(root);

    command
  }
}

fn lookup<'a>(env: &'a EnvVars, key: &str) -> Option<&'a str> {
  env.get(key).map(String::as_str)
}

/// Values given on the command line, which take precedence over the
/// environment file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
  pub iterations: Option<u32>,
  pub timeout_secs: Option<u64>,
}

/// Everything the harness needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
  /// Canonical project root. Toolchain invocations and the artifact run here.
  pub root: PathBuf,
  /// Holds one directory per optimization category plus the report.
  pub benchmarks_dir: PathBuf,
  /// File name of the report inside `benchmarks_dir`.
  pub report_name: String,
  /// Sources in here are part of every compilation.
  pub stdlib_dir: PathBuf,
  /// Extension of the compiled language's source files, without the dot.
  pub extension: String,
  pub compiler: ToolCommand,
  pub assembler: ToolCommand,
  /// Absolute path of the runnable artifact the assembler leaves behind.
  pub artifact: PathBuf,
  pub iterations: u32,
  /// Upper bound for any single subprocess invocation.
  pub timeout: Duration,
  pub unoptimized_flags: Vec<String>,
  /// Followed by the category name to form the optimized flag set.
  pub optimized_flag: String,
  /// Environment file entries, passed on to every child process.
  pub env: EnvVars,
}

impl Config {
  /// Canonicalizes `root`, loads the environment file and resolves the rest.
  ///
  /// Without an explicit `env_file`, `<root>/.env` is used when it exists.
  pub fn load(root: &Path, env_file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
    let root = root
      .canonicalize()
      .with_context(|| format!("project root {root:?}"))?;

    let env = match env_file {
      Some(path) => load_env_file(path)?,
      None if root.join(ENV_FILE).is_file() => load_env_file(&root.join(ENV_FILE))?,
      None => {
        debug!(path = ?root.join(ENV_FILE), "no environment file, using defaults");
        EnvVars::new()
      }
    };

    Self::resolve(root, env, overrides)
  }

  /// Resolution order for each setting: command line, then the `OPTBENCH_*`
  /// key of the environment file, then the built-in default.
  pub fn resolve(root: PathBuf, env: EnvVars, overrides: &Overrides) -> Result<Self> {
    let get = |key: &str| lookup(&env, key);
    let path = |key: &str, default: &str| root.join(lookup(&env, key).unwrap_or(default));

    let iterations = match (overrides.iterations, get("OPTBENCH_ITERATIONS")) {
      (Some(n), _) => n,
      (None, Some(n)) => n.parse::<u32>().with_context(|| format!("OPTBENCH_ITERATIONS={n:?}"))?,
      (None, None) => DEFAULT_ITERATIONS,
    };
    if iterations == 0 {
      anyhow::bail!("iteration count must be positive");
    }

    let timeout = match (overrides.timeout_secs, get("OPTBENCH_TIMEOUT")) {
      (Some(secs), _) => Duration::from_secs(secs),
      (None, Some(secs)) => {
        let secs = secs.parse::<u64>().with_context(|| format!("OPTBENCH_TIMEOUT={secs:?}"))?;
        Duration::from_secs(secs)
      }
      (None, None) => DEFAULT_TIMEOUT,
    };

    let unoptimized_flags = get("OPTBENCH_UNOPTIMIZED_FLAGS")
      .unwrap_or("--opt-none")
      .split_whitespace()
      .map(str::to_string)
      .collect();

    Ok(Self {
      benchmarks_dir: path("OPTBENCH_BENCHMARKS_DIR", "benchmarks"),
      report_name: get("OPTBENCH_REPORT").unwrap_or("results.csv").to_string(),
      stdlib_dir: path("OPTBENCH_STDLIB_DIR", "tests/stdlib"),
      extension: get("OPTBENCH_EXTENSION")
        .unwrap_or("java")
        .trim_start_matches('.')
        .to_string(),
      compiler: get("OPTBENCH_COMPILER")
        .unwrap_or("./joosc")
        .parse::<ToolCommand>()
        .context("OPTBENCH_COMPILER")?,
      assembler: get("OPTBENCH_ASSEMBLER")
        .unwrap_or("./assemble")
        .parse::<ToolCommand>()
        .context("OPTBENCH_ASSEMBLER")?,
      artifact: path("OPTBENCH_ARTIFACT", "main"),
      iterations,
      timeout,
      unoptimized_flags,
      optimized_flag: get("OPTBENCH_OPTIMIZED_FLAG").unwrap_or("--optimized").to_string(),
      root,
      env,
    })
  }

  pub fn report_path(&self) -> PathBuf {
    self.benchmarks_dir.join(&self.report_name)
  }

  /// Flags for the optimized build of a program in `category`.
  pub fn optimized_flags(&self, category: &str) -> Vec<String> {
    vec![self.optimized_flag.clone(), category.to_string()]
  }
}
