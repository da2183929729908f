#![warn(missing_docs)]
//! # SweepBench
//!
//! Experiment controller for parameter sweeps over compiled compute targets.
//!
//! SweepBench drives repeated build-and-run cycles of a parameterized
//! program and turns the timing lines it prints into durable CSV tables:
//! - **Constrained config space**: (size, threads, mode, alpha, beta) tuples
//!   filtered by divisibility constraints, grouped by size
//! - **Interleaved scheduling**: repetition rounds cycle through every tuple
//!   before any tuple runs twice, spreading thermal and load drift
//! - **Source mutation + build cache**: `#define` constants rewritten in
//!   place, with rebuilds skipped when only the dataset size changes
//! - **Crash-safe tables**: an fsync-per-row run log, an append-only
//!   aggregate table, and a fully-rewritten best-per-group table
//! - **Resume**: a restarted sweep diffs its schedule against the run log
//!   and executes only what is missing
//! - **Source guard**: the mutated source is restored from a backup on
//!   every exit path, including panics
//!
//! ## Quick Start
//!
//! ```ignore
//! use sweepbench::{SweepOptions, run_sweep};
//!
//! let opts = SweepOptions { /* resolved paths and candidate lists */ };
//! run_sweep(&opts)?;
//! ```
//!
//! Or drive it entirely from the command line:
//!
//! ```text
//! sweepbench --repo-root ../scheduler --sizes 2400,4800 --runs 3
//! ```

// Re-export core types
pub use sweepbench_core::{
    BuildSignature, ConfigSpace, InvalidMode, Mode, ParameterTuple, ScheduledRun,
    build_config_space, build_schedule,
};

// Re-export stats
pub use sweepbench_stats::{AggregateStats, compute_aggregate};

// Re-export the sweep engine and CLI surface
pub use sweepbench_cli::{
    AggregateWriter, Aggregator, BestRecord, BestTable, BuildCache, BuildError, Cli,
    ConfigAggregate, ExecutionHarness, GroupKey, HarnessError, ResumeState, RunLogWriter,
    RunOutcome, SourceGuard, SweepConfig, SweepError, SweepOptions, run_sweep, run_with_cli,
};

/// Run the SweepBench CLI harness.
///
/// Call this from a sweep binary's `main()`:
/// ```ignore
/// fn main() {
///     sweepbench::run().unwrap();
/// }
/// ```
pub use sweepbench_cli::run;
