//! Durable Result Tables
//!
//! Three CSV tables back the sweep:
//!
//! - the **run log**: one append-only row per attempted execution, fsynced
//!   immediately — on its own sufficient to resume a sweep by diffing
//!   against the planned schedule;
//! - the **aggregate table**: one append-only row per tuple, emitted exactly
//!   once when the tuple's repetition quota is met;
//! - the **best table**: one row per (size, threads, mode) group, fully
//!   rewritten from the in-memory map on every improvement so the file is
//!   always a consistent snapshot of best-known state.
//!
//! Missing measurements travel as NaN; downstream numeric aggregation
//! excludes them without special-casing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use sweepbench_core::{Mode, ParameterTuple};
use sweepbench_stats::{AggregateStats, compute_aggregate};

const RUN_LOG_HEADER: &str = "size,threads,mode,alpha,beta,run_index,latency_ms";
const AGGREGATE_HEADER: &str =
    "size,threads,mode,alpha,beta,samples,mean_ms,stddev_ms,min_ms,max_ms";
const BEST_HEADER: &str = "size,threads,mode,best_alpha,best_beta,samples,mean_ms,stddev_ms";

/// Finalized statistics for one tuple, emitted once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigAggregate {
    /// The measurement bucket these statistics summarize.
    pub tuple: ParameterTuple,
    /// Statistics over the tuple's non-NaN samples.
    pub stats: AggregateStats,
}

/// Grouping key for best tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    /// Dataset size.
    pub size: u64,
    /// Thread count.
    pub threads: u64,
    /// Task-queue mode.
    pub mode: Mode,
}

impl GroupKey {
    fn of(tuple: &ParameterTuple) -> Self {
        Self {
            size: tuple.size,
            threads: tuple.threads,
            mode: tuple.mode,
        }
    }
}

/// Lowest-mean configuration observed so far within one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestRecord {
    /// Winning alpha.
    pub alpha: u64,
    /// Winning beta.
    pub beta: u64,
    /// Valid samples behind the winning mean.
    pub sample_count: usize,
    /// Winning mean latency.
    pub mean_ms: f64,
    /// Stddev of the winning configuration.
    pub stddev_ms: f64,
}

fn open_append_with_header(path: &Path, header: &str) -> std::io::Result<File> {
    let fresh = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if fresh {
        writeln!(file, "{header}")?;
        file.sync_all()?;
    }
    Ok(file)
}

/// Append-only writer for the per-run log.
pub struct RunLogWriter {
    file: File,
}

impl RunLogWriter {
    /// Open (or create with header) the run log at `path`.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            file: open_append_with_header(path, RUN_LOG_HEADER)?,
        })
    }

    /// Append one sample and make it durable before returning.
    pub fn append(
        &mut self,
        tuple: &ParameterTuple,
        run_index: u32,
        latency_ms: f64,
    ) -> std::io::Result<()> {
        writeln!(
            self.file,
            "{},{},{},{},{},{},{}",
            tuple.size, tuple.threads, tuple.mode, tuple.alpha, tuple.beta, run_index, latency_ms
        )?;
        self.file.sync_all()
    }
}

/// Append-only writer for finalized aggregates.
pub struct AggregateWriter {
    file: File,
}

impl AggregateWriter {
    /// Open (or create with header) the aggregate table at `path`.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            file: open_append_with_header(path, AGGREGATE_HEADER)?,
        })
    }

    /// Append one aggregate row and make it durable before returning.
    pub fn append(&mut self, agg: &ConfigAggregate) -> std::io::Result<()> {
        let t = &agg.tuple;
        let s = &agg.stats;
        writeln!(
            self.file,
            "{},{},{},{},{},{},{:.4},{:.4},{:.4},{:.4}",
            t.size,
            t.threads,
            t.mode,
            t.alpha,
            t.beta,
            s.sample_count,
            s.mean_ms,
            s.stddev_ms,
            s.min_ms,
            s.max_ms
        )?;
        self.file.sync_all()
    }
}

/// In-memory best-per-group map plus its fully-rewritten table file.
///
/// The map is the source of truth; the file is an idempotent serialization
/// of it. A fresh handle is opened for every rewrite and closed (dropped)
/// after fsync, so an interrupted process never leaves a partial row behind
/// a stale descriptor.
pub struct BestTable {
    path: PathBuf,
    records: BTreeMap<GroupKey, BestRecord>,
}

impl BestTable {
    /// Create an empty best table backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    /// Current best records, sorted by group key.
    pub fn records(&self) -> &BTreeMap<GroupKey, BestRecord> {
        &self.records
    }

    /// Fold an aggregate into the map without touching the file.
    ///
    /// Strictly lower mean wins; ties keep the incumbent. NaN means (tuples
    /// with no parsed sample) never displace anything. Returns whether the
    /// map changed.
    pub fn fold(&mut self, agg: &ConfigAggregate) -> bool {
        if agg.stats.mean_ms.is_nan() {
            return false;
        }
        let key = GroupKey::of(&agg.tuple);
        let improved = match self.records.get(&key) {
            Some(current) => agg.stats.mean_ms < current.mean_ms,
            None => true,
        };
        if improved {
            self.records.insert(
                key,
                BestRecord {
                    alpha: agg.tuple.alpha,
                    beta: agg.tuple.beta,
                    sample_count: agg.stats.sample_count,
                    mean_ms: agg.stats.mean_ms,
                    stddev_ms: agg.stats.stddev_ms,
                },
            );
        }
        improved
    }

    /// Fold an aggregate and rewrite the file when the map changed.
    pub fn observe(&mut self, agg: &ConfigAggregate) -> std::io::Result<bool> {
        if self.fold(agg) {
            self.rewrite()?;
            tracing::info!(
                size = agg.tuple.size,
                threads = agg.tuple.threads,
                mode = %agg.tuple.mode,
                alpha = agg.tuple.alpha,
                beta = agg.tuple.beta,
                mean_ms = agg.stats.mean_ms,
                "best record updated"
            );
            return Ok(true);
        }
        Ok(false)
    }

    /// Serialize the whole map to the table file, replacing prior content.
    pub fn rewrite(&self) -> std::io::Result<()> {
        let mut file = File::create(&self.path)?;
        writeln!(file, "{BEST_HEADER}")?;
        for (key, rec) in &self.records {
            writeln!(
                file,
                "{},{},{},{},{},{},{:.4},{:.4}",
                key.size,
                key.threads,
                key.mode,
                rec.alpha,
                rec.beta,
                rec.sample_count,
                rec.mean_ms,
                rec.stddev_ms
            )?;
        }
        file.sync_all()
    }
}

/// Accumulates samples per tuple and finalizes each exactly once.
pub struct Aggregator {
    target_runs: u32,
    pending: HashMap<ParameterTuple, Vec<f64>>,
    completed: HashSet<ParameterTuple>,
}

impl Aggregator {
    /// Aggregator expecting `target_runs` samples per tuple.
    pub fn new(target_runs: u32) -> Self {
        Self {
            target_runs: target_runs.max(1),
            pending: HashMap::new(),
            completed: HashSet::new(),
        }
    }

    /// Mark a tuple as already finalized (its aggregate row is durable from
    /// a previous process), so replayed samples cannot re-emit it.
    pub fn mark_complete(&mut self, tuple: ParameterTuple) {
        self.completed.insert(tuple);
        self.pending.remove(&tuple);
    }

    /// Fold one sample in. Returns the finalized aggregate when this sample
    /// fills the tuple's quota; NaN samples count toward the quota but are
    /// excluded from the statistics.
    pub fn record(&mut self, tuple: ParameterTuple, latency_ms: f64) -> Option<ConfigAggregate> {
        if self.completed.contains(&tuple) {
            return None;
        }
        let samples = self.pending.entry(tuple).or_default();
        samples.push(latency_ms);
        if samples.len() < self.target_runs as usize {
            return None;
        }
        let stats = compute_aggregate(samples);
        self.pending.remove(&tuple);
        self.completed.insert(tuple);
        Some(ConfigAggregate { tuple, stats })
    }
}

/// Durable state recovered from the tables of an interrupted sweep.
#[derive(Debug, Default)]
pub struct ResumeState {
    /// (tuple, run_index) pairs already present in the run log.
    pub seen: HashSet<(ParameterTuple, u32)>,
    /// Logged samples in log order, for replay into the aggregator.
    pub samples: Vec<(ParameterTuple, f64)>,
    /// Tuples whose aggregate row already exists.
    pub aggregated: Vec<ConfigAggregate>,
}

impl ResumeState {
    /// Read back the run log and aggregate table, if present.
    ///
    /// Malformed rows are skipped with a warning rather than aborting:
    /// a torn final line is expected after a crash mid-append.
    pub fn load(run_log: &Path, aggregate_table: &Path) -> std::io::Result<Self> {
        let mut state = Self::default();

        if run_log.exists() {
            for line in data_lines(run_log)? {
                match parse_run_row(&line) {
                    Some((tuple, run_index, latency)) => {
                        state.seen.insert((tuple, run_index));
                        state.samples.push((tuple, latency));
                    }
                    None => tracing::warn!(row = %line, "skipping malformed run-log row"),
                }
            }
        }

        if aggregate_table.exists() {
            for line in data_lines(aggregate_table)? {
                match parse_aggregate_row(&line) {
                    Some(agg) => state.aggregated.push(agg),
                    None => tracing::warn!(row = %line, "skipping malformed aggregate row"),
                }
            }
        }

        Ok(state)
    }

    /// Whether anything durable was recovered.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty() && self.aggregated.is_empty()
    }
}

fn data_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    // Drop the header row.
    Ok(lines.into_iter().skip(1).filter(|l| !l.is_empty()).collect())
}

fn parse_tuple(fields: &[&str]) -> Option<ParameterTuple> {
    Some(ParameterTuple {
        size: fields[0].parse().ok()?,
        threads: fields[1].parse().ok()?,
        mode: Mode::try_from(fields[2].parse::<u64>().ok()?).ok()?,
        alpha: fields[3].parse().ok()?,
        beta: fields[4].parse().ok()?,
    })
}

fn parse_run_row(line: &str) -> Option<(ParameterTuple, u32, f64)> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 7 {
        return None;
    }
    let tuple = parse_tuple(&fields)?;
    let run_index = fields[5].parse().ok()?;
    let latency = fields[6].parse().ok()?;
    Some((tuple, run_index, latency))
}

fn parse_aggregate_row(line: &str) -> Option<ConfigAggregate> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 10 {
        return None;
    }
    let tuple = parse_tuple(&fields)?;
    Some(ConfigAggregate {
        tuple,
        stats: AggregateStats {
            sample_count: fields[5].parse().ok()?,
            mean_ms: fields[6].parse().ok()?,
            stddev_ms: fields[7].parse().ok()?,
            min_ms: fields[8].parse().ok()?,
            max_ms: fields[9].parse().ok()?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(size: u64, alpha: u64, beta: u64) -> ParameterTuple {
        ParameterTuple {
            size,
            threads: 4,
            mode: Mode::WithoutPriority,
            alpha,
            beta,
        }
    }

    fn aggregate(t: ParameterTuple, mean: f64) -> ConfigAggregate {
        ConfigAggregate {
            tuple: t,
            stats: AggregateStats {
                sample_count: 3,
                mean_ms: mean,
                stddev_ms: 0.5,
                min_ms: mean - 1.0,
                max_ms: mean + 1.0,
            },
        }
    }

    #[test]
    fn test_aggregator_emits_at_quota() {
        let mut agg = Aggregator::new(3);
        let t = tuple(8, 2, 4);
        assert!(agg.record(t, 10.0).is_none());
        assert!(agg.record(t, 20.0).is_none());
        let out = agg.record(t, 30.0).expect("third sample completes");
        assert_eq!(out.stats.sample_count, 3);
        assert!((out.stats.mean_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregator_emits_exactly_once() {
        let mut agg = Aggregator::new(1);
        let t = tuple(8, 2, 4);
        assert!(agg.record(t, 5.0).is_some());
        assert!(agg.record(t, 6.0).is_none());
    }

    #[test]
    fn test_nan_counts_toward_quota_but_not_stats() {
        let mut agg = Aggregator::new(3);
        let t = tuple(8, 2, 4);
        agg.record(t, 10.0);
        agg.record(t, f64::NAN);
        let out = agg.record(t, 20.0).expect("quota met with a NaN inside");
        assert_eq!(out.stats.sample_count, 2);
        assert!((out.stats.mean_ms - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_mark_complete_suppresses_replay() {
        let mut agg = Aggregator::new(1);
        let t = tuple(8, 2, 4);
        agg.mark_complete(t);
        assert!(agg.record(t, 5.0).is_none());
    }

    #[test]
    fn test_best_strictly_lower_wins_ties_do_not() {
        let dir = tempfile::tempdir().unwrap();
        let mut best = BestTable::new(dir.path().join("best.csv"));

        assert!(best.observe(&aggregate(tuple(8, 2, 4), 10.0)).unwrap());
        // Equal mean: incumbent stays.
        assert!(!best.observe(&aggregate(tuple(8, 4, 4), 10.0)).unwrap());
        // Strictly lower: replaced.
        assert!(best.observe(&aggregate(tuple(8, 2, 2), 9.0)).unwrap());

        let rec = best.records().values().next().unwrap();
        assert_eq!((rec.alpha, rec.beta), (2, 2));
    }

    #[test]
    fn test_best_means_non_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let mut best = BestTable::new(dir.path().join("best.csv"));
        let mut last = f64::INFINITY;
        for mean in [12.0, 15.0, 9.0, 9.0, 20.0, 7.5] {
            best.observe(&aggregate(tuple(8, 2, 4), mean)).unwrap();
            let current = best.records().values().next().unwrap().mean_ms;
            assert!(current <= last);
            last = current;
        }
        assert_eq!(last, 7.5);
    }

    #[test]
    fn test_best_ignores_nan_mean() {
        let dir = tempfile::tempdir().unwrap();
        let mut best = BestTable::new(dir.path().join("best.csv"));
        let mut all_failed = aggregate(tuple(8, 2, 4), f64::NAN);
        all_failed.stats.sample_count = 0;
        assert!(!best.observe(&all_failed).unwrap());
        assert!(best.records().is_empty());
    }

    #[test]
    fn test_best_rewrite_is_sorted_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.csv");
        let mut best = BestTable::new(&path);
        best.observe(&aggregate(tuple(1024, 2, 4), 20.0)).unwrap();
        best.observe(&aggregate(tuple(512, 2, 2), 10.0)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], BEST_HEADER);
        assert!(lines[1].starts_with("512,"));
        assert!(lines[2].starts_with("1024,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_run_log_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("runs.csv");
        let agg_path = dir.path().join("agg.csv");

        let t = tuple(512, 2, 4);
        {
            let mut log = RunLogWriter::open(&log_path).unwrap();
            log.append(&t, 0, 12.5).unwrap();
            log.append(&t, 1, f64::NAN).unwrap();
        }

        let state = ResumeState::load(&log_path, &agg_path).unwrap();
        assert_eq!(state.samples.len(), 2);
        assert!(state.seen.contains(&(t, 0)));
        assert!(state.seen.contains(&(t, 1)));
        assert!(state.samples[1].1.is_nan());
    }

    #[test]
    fn test_aggregate_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("runs.csv");
        let agg_path = dir.path().join("agg.csv");

        let agg = aggregate(tuple(512, 2, 4), 11.0);
        {
            let mut writer = AggregateWriter::open(&agg_path).unwrap();
            writer.append(&agg).unwrap();
        }

        let state = ResumeState::load(&log_path, &agg_path).unwrap();
        assert_eq!(state.aggregated.len(), 1);
        assert_eq!(state.aggregated[0].tuple, agg.tuple);
        assert!((state.aggregated[0].stats.mean_ms - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_torn_trailing_row_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("runs.csv");
        let agg_path = dir.path().join("agg.csv");

        let t = tuple(512, 2, 4);
        {
            let mut log = RunLogWriter::open(&log_path).unwrap();
            log.append(&t, 0, 12.5).unwrap();
        }
        // Crash mid-append: partial row without trailing newline.
        {
            let mut f = OpenOptions::new().append(true).open(&log_path).unwrap();
            write!(f, "512,4,0,2").unwrap();
        }

        let state = ResumeState::load(&log_path, &agg_path).unwrap();
        assert_eq!(state.samples.len(), 1);
    }
}
