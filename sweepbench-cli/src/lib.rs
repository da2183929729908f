#![warn(missing_docs)]
//! SweepBench CLI Library
//!
//! Thin translation from the command line (plus an optional `sweep.toml`)
//! into the sweep engine's [`SweepOptions`]. The engine itself lives in
//! [`sweep`]; everything here is argument plumbing, path resolution, and
//! logging setup.

mod builder;
mod config;
mod dataset;
mod guard;
mod harness;
mod provision;
mod sweep;
mod tables;

pub use builder::{BuildCache, BuildError, render_constant};
pub use config::{SweepConfig, parse_list, parse_range_or_list};
pub use guard::SourceGuard;
pub use harness::{ExecutionHarness, HarnessError, RunOutcome};
pub use sweep::{SweepError, SweepOptions, run_sweep};
pub use tables::{
    AggregateWriter, Aggregator, BestRecord, BestTable, ConfigAggregate, GroupKey, ResumeState,
    RunLogWriter,
};

use clap::Parser;
use std::path::PathBuf;
use sweepbench_core::Mode;

/// SweepBench CLI arguments.
///
/// Parameter lists accept comma-separated values; alphas and betas also
/// accept `start:stop:step` range syntax (stop exclusive).
#[derive(Parser, Debug)]
#[command(name = "sweepbench")]
#[command(author, version, about = "SweepBench - parameter sweep controller for compiled targets")]
pub struct Cli {
    /// Repo root where the Makefile and target source live
    #[arg(long, default_value = ".")]
    pub repo_root: PathBuf,

    /// Target source file, relative to the repo root
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Compiled binary to execute, relative to the repo root
    #[arg(long)]
    pub exec: Option<PathBuf>,

    /// Matrix artifact directory, relative to the repo root
    #[arg(long)]
    pub testcase: Option<PathBuf>,

    /// Results directory, relative to the repo root
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Candidate dataset sizes
    #[arg(long, default_value = "512,1024,2048,4096,8192")]
    pub sizes: String,

    /// Candidate thread counts
    #[arg(long, default_value = "26")]
    pub threads: String,

    /// Candidate modes (0 = without priority, 1 = with priority)
    #[arg(long, default_value = "0,1")]
    pub modes: String,

    /// Candidate alpha values (list or start:stop:step)
    #[arg(long, default_value = "2:33:2")]
    pub alphas: String,

    /// Candidate beta values (list or start:stop:step)
    #[arg(long, default_value = "2:33:2")]
    pub betas: String,

    /// Repetitions per tuple
    #[arg(long)]
    pub runs: Option<u32>,

    /// Per-execution timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Allow auto-generation of very large matrix artifacts
    #[arg(long)]
    pub allow_large: bool,

    /// Skip the best-effort TBB provisioning probe
    #[arg(long)]
    pub skip_provision: bool,

    /// Verbose (debug-level) logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the SweepBench CLI. This is the entry point for the binary.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the SweepBench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let filter = if cli.verbose {
        "sweepbench=debug"
    } else {
        "sweepbench=info"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Discover sweep.toml defaults; CLI flags override.
    let config = SweepConfig::discover().unwrap_or_default();
    let opts = resolve_options(&cli, &config)?;

    if !opts.repo_root.exists() {
        anyhow::bail!("repo root not found: {}", opts.repo_root.display());
    }
    if !opts.source.exists() {
        anyhow::bail!("target source not found: {}", opts.source.display());
    }

    if !cli.skip_provision {
        provision::ensure_tbb();
    }

    run_sweep(&opts)?;
    Ok(())
}

/// Layer CLI flags over sweep.toml defaults and resolve every path against
/// the repo root.
fn resolve_options(cli: &Cli, config: &SweepConfig) -> anyhow::Result<SweepOptions> {
    let repo_root = cli
        .repo_root
        .canonicalize()
        .unwrap_or_else(|_| cli.repo_root.clone());

    let join = |p: &PathBuf| {
        if p.is_absolute() {
            p.clone()
        } else {
            repo_root.join(p)
        }
    };

    let source = join(&cli
        .source
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.target.source)));
    let exec = join(&cli
        .exec
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.target.exec)));
    let testcase_dir = join(&cli
        .testcase
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.target.testcase)));
    let results_dir = join(&cli
        .results_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.directory)));

    let modes = parse_list(&cli.modes)?
        .into_iter()
        .map(|m| Mode::try_from(m).map_err(anyhow::Error::from))
        .collect::<anyhow::Result<Vec<Mode>>>()?;

    Ok(SweepOptions {
        repo_root,
        source,
        exec,
        testcase_dir,
        run_log: results_dir.join(&config.output.run_log),
        aggregate_table: results_dir.join(&config.output.aggregate),
        best_table: results_dir.join(&config.output.best),
        sizes: parse_list(&cli.sizes)?,
        threads: parse_list(&cli.threads)?,
        modes,
        alphas: parse_range_or_list(&cli.alphas)?,
        betas: parse_range_or_list(&cli.betas)?,
        runs: cli.runs.unwrap_or(config.runner.runs),
        timeout: cli
            .timeout
            .or(config.runner.timeout_secs)
            .map(std::time::Duration::from_secs),
        allow_large: cli.allow_large || config.runner.allow_large,
    })
}
