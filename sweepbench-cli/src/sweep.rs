//! Sweep Orchestration
//!
//! Drives the whole experiment: config space → interleaved schedule →
//! {build cache → execution harness → aggregation} per scheduled run, with
//! the source guard wrapping the loop. Strictly sequential: one tuple's
//! build (if any) and one execution complete before the next run is
//! considered.
//!
//! Resume comes for free from the durable tables: scheduled runs whose
//! (tuple, run_index) pair already appears in the run log are skipped, and
//! their samples are replayed into the aggregator at startup.

use crate::builder::{BuildCache, BuildError};
use crate::dataset;
use crate::guard::SourceGuard;
use crate::harness::{ExecutionHarness, HarnessError, RunOutcome};
use crate::tables::{AggregateWriter, Aggregator, BestTable, ResumeState, RunLogWriter};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use sweepbench_core::{Mode, ScheduledRun, build_config_space, build_schedule};
use thiserror::Error;

/// Fatal sweep outcomes, mapped onto process exit codes by the binary.
#[derive(Debug, Error)]
pub enum SweepError {
    /// No tuple satisfies the divisibility constraints. Exit code 2.
    #[error("no parameter tuple satisfies the divisibility constraints; nothing to run")]
    EmptyConfigSpace,

    /// The target failed to compile. Exit code 1.
    #[error("target build failed:\n{output}")]
    Build {
        /// Captured build output, surfaced for the operator.
        output: String,
    },

    /// A table write, source mutation, or process launch failed.
    /// Durability of results cannot be silently degraded.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SweepError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SweepError::EmptyConfigSpace => 2,
            SweepError::Build { .. } => 1,
            SweepError::Io(_) => 1,
        }
    }
}

impl From<BuildError> for SweepError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::SourceIo(io) => SweepError::Io(io),
            BuildError::CompileFailed { output, .. } => SweepError::Build { output },
        }
    }
}

impl From<HarnessError> for SweepError {
    fn from(e: HarnessError) -> Self {
        match e {
            HarnessError::Spawn(io) => SweepError::Io(io),
        }
    }
}

/// Fully resolved inputs for one sweep. All paths are absolute.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Orchestration root; builds and executions run from here.
    pub repo_root: PathBuf,
    /// Target source file, mutated in place during the sweep.
    pub source: PathBuf,
    /// Compiled target binary.
    pub exec: PathBuf,
    /// Directory of matrix artifacts.
    pub testcase_dir: PathBuf,
    /// Append-only per-run log.
    pub run_log: PathBuf,
    /// Append-only aggregate table.
    pub aggregate_table: PathBuf,
    /// Fully-rewritten best table.
    pub best_table: PathBuf,
    /// Candidate dataset sizes.
    pub sizes: Vec<u64>,
    /// Candidate thread counts.
    pub threads: Vec<u64>,
    /// Candidate modes.
    pub modes: Vec<Mode>,
    /// Candidate alpha values.
    pub alphas: Vec<u64>,
    /// Candidate beta values.
    pub betas: Vec<u64>,
    /// Repetitions per tuple.
    pub runs: u32,
    /// Optional per-execution timeout.
    pub timeout: Option<Duration>,
    /// Permit generation of very large artifacts.
    pub allow_large: bool,
}

type SeenRuns = std::collections::HashSet<(sweepbench_core::ParameterTuple, u32)>;

/// The three result tables plus the in-memory accumulator, folded as a unit
/// so every sample takes the same durable path: run log first, then (on
/// quota) aggregate row, then best-table rewrite.
struct ResultTables {
    log: RunLogWriter,
    aggregates: AggregateWriter,
    best: BestTable,
    aggregator: Aggregator,
}

impl ResultTables {
    /// Open the tables and rebuild in-memory state from anything a prior
    /// process left behind. Returns the (tuple, run_index) pairs already
    /// durable in the run log — the schedule diff for resume.
    fn open(opts: &SweepOptions) -> Result<(Self, SeenRuns), SweepError> {
        // Read the durable state before opening the append handles, so the
        // recovery view is not confused by header creation.
        let resume = ResumeState::load(&opts.run_log, &opts.aggregate_table)?;

        let mut tables = Self {
            log: RunLogWriter::open(&opts.run_log)?,
            aggregates: AggregateWriter::open(&opts.aggregate_table)?,
            best: BestTable::new(&opts.best_table),
            aggregator: Aggregator::new(opts.runs),
        };

        if !resume.is_empty() {
            tracing::info!(
                samples = resume.samples.len(),
                aggregates = resume.aggregated.len(),
                "resuming from durable tables"
            );

            for agg in &resume.aggregated {
                tables.aggregator.mark_complete(agg.tuple);
                tables.best.fold(agg);
            }
            if !tables.best.records().is_empty() {
                tables.best.rewrite()?;
            }

            // Replaying the log finalizes any tuple whose quota was met but
            // whose aggregate row was lost to a crash in between.
            for &(tuple, latency) in &resume.samples {
                if let Some(agg) = tables.aggregator.record(tuple, latency) {
                    tables.aggregates.append(&agg)?;
                    tables.best.observe(&agg)?;
                }
            }
        }

        Ok((tables, resume.seen))
    }

    fn absorb(&mut self, run: &ScheduledRun, latency_ms: f64) -> Result<(), SweepError> {
        self.log.append(&run.tuple, run.run_index, latency_ms)?;
        if let Some(agg) = self.aggregator.record(run.tuple, latency_ms) {
            tracing::info!(
                tuple = %agg.tuple,
                samples = agg.stats.sample_count,
                mean_ms = agg.stats.mean_ms,
                stddev_ms = agg.stats.stddev_ms,
                "tuple aggregated"
            );
            self.aggregates.append(&agg)?;
            self.best.observe(&agg)?;
        }
        Ok(())
    }
}

/// Run the whole sweep described by `opts`.
pub fn run_sweep(opts: &SweepOptions) -> Result<(), SweepError> {
    let space = build_config_space(
        &opts.sizes,
        &opts.threads,
        &opts.modes,
        &opts.alphas,
        &opts.betas,
    );
    let total_tuples: usize = space.values().map(Vec::len).sum();
    if total_tuples == 0 {
        return Err(SweepError::EmptyConfigSpace);
    }

    if let Some(dir) = opts.run_log.parent() {
        std::fs::create_dir_all(dir)?;
    }

    for &n in &opts.sizes {
        dataset::generate_if_missing(&opts.testcase_dir, n, opts.allow_large)?;
    }

    let schedule = build_schedule(&space, opts.runs);
    tracing::info!(
        planned_runs = schedule.len(),
        tuples = total_tuples,
        "sweep planned"
    );

    let (mut tables, seen) = ResultTables::open(opts)?;

    let mut guard = SourceGuard::install(&opts.source)?;
    let run_result = execute_schedule(opts, &schedule, &seen, &mut tables);
    let restore_result = guard.restore();

    run_result?;
    restore_result?;

    tracing::info!(
        run_log = %opts.run_log.display(),
        aggregates = %opts.aggregate_table.display(),
        best = %opts.best_table.display(),
        "sweep complete"
    );
    Ok(())
}

fn execute_schedule(
    opts: &SweepOptions,
    schedule: &[ScheduledRun],
    seen: &SeenRuns,
    tables: &mut ResultTables,
) -> Result<(), SweepError> {
    let mut cache = BuildCache::new(&opts.repo_root, &opts.source);
    let harness = ExecutionHarness::new(&opts.exec, &opts.repo_root, opts.timeout);

    let pb = ProgressBar::new(schedule.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    for run in schedule {
        if seen.contains(&(run.tuple, run.run_index)) {
            pb.inc(1);
            continue;
        }
        pb.set_message(format!("{} run {}", run.tuple, run.run_index + 1));
        tracing::info!(
            tuple = %run.tuple,
            run = run.run_index + 1,
            of = opts.runs,
            "executing scheduled run"
        );

        cache.ensure_built(run.tuple.build_signature())?;

        let artifact = dataset::matrix_path(&opts.testcase_dir, run.tuple.size);
        let latency_ms = match harness.run(&artifact)? {
            RunOutcome::Measured(ms) => ms,
            RunOutcome::Unparsed { tail } => {
                tracing::warn!(
                    tuple = %run.tuple,
                    run = run.run_index,
                    "no measurement in target output; recording NaN\n--- output tail ---\n{tail}"
                );
                f64::NAN
            }
        };

        tables.absorb(run, latency_ms)?;
        pb.inc(1);
    }

    pb.finish_with_message("sweep complete");
    Ok(())
}
