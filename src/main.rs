mod bench;
mod compile;
mod config;
mod discover;
mod ext;
mod format;
mod report;
mod run;
mod stats;
mod toolchain;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use self::{
  bench::Bench,
  config::{Config, Overrides},
  toolchain::ProcessToolchain,
};

#[derive(Parser)]
struct Args {
  /// Log debug output.
  #[arg(short, long, global = true)]
  verbose: bool,
  #[command(subcommand)]
  command: Command,
}

#[derive(ClapArgs, Debug)]
struct Project {
  /// Project root; the toolchain and benchmark programs run from here.
  #[arg(long, default_value = ".")]
  root: PathBuf,
  /// Environment file to load [default: <root>/.env, if present].
  #[arg(long)]
  env_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Compile every benchmark with and without its optimization and record the
  /// speedups.
  Bench {
    #[command(flatten)]
    project: Project,
    /// Only benchmark these categories.
    #[arg(short, long)]
    category: Vec<String>,
    /// Runs per build [default: 100].
    #[arg(short = 'n', long)]
    iterations: Option<u32>,
    /// Timeout in seconds for any single compiler, assembler or program run
    /// [default: 600].
    #[arg(long)]
    timeout: Option<u64>,
  },
  /// List the discovered categories and their programs.
  List {
    #[command(flatten)]
    project: Project,
  },
}

fn init_logging(verbose: bool) {
  let default = if verbose { "optbench=debug" } else { "optbench=info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

fn load_config(project: &Project, overrides: &Overrides) -> Result<Config> {
  Config::load(&project.root, project.env_file.as_deref(), overrides).context("load config")
}

fn main() -> Result<()> {
  let args = Args::parse();
  init_logging(args.verbose);

  match args.command {
    Command::Bench {
      project,
      category,
      iterations,
      timeout,
    } => {
      let overrides = Overrides {
        iterations,
        timeout_secs: timeout,
      };
      let config = load_config(&project, &overrides)?;

      let mut bench = Bench::new(&config, ProcessToolchain::new(&config)).context("Bench::new")?;
      for results in bench.bench(&category).context("bench")? {
        println!("{}", format::format(&results.category, &results.rows).context("format")?);
      }
    }
    Command::List { project } => {
      let config = load_config(&project, &Overrides::default())?;

      for category in discover::categories(&config.benchmarks_dir, &config.report_name)? {
        println!("{category}");
        for program in discover::programs(&config.benchmarks_dir.join(&category))? {
          println!("  {}", discover::program_name(&program)?);
        }
      }
    }
  }

  Ok(())
}
