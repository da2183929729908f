//! Integration tests for SweepBench
//!
//! These tests verify the end-to-end behavior of the sweep controller
//! against a fake target repo: a Makefile that stamps instead of compiling
//! and a shell script standing in for the compiled binary.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use sweepbench::{
    Mode, SweepError, SweepOptions, build_config_space, build_schedule, compute_aggregate,
    run_sweep,
};

fn write_exec(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

fn fake_repo(dir: &Path, exec_body: &str) -> SweepOptions {
    fs::write(
        dir.join("main.cpp"),
        "#include <vector>\n#include <cstdio>\nint main() { return 0; }\n",
    )
    .unwrap();
    fs::write(
        dir.join("Makefile"),
        "all:\n\ttouch built.stamp\nclean:\n\trm -f built.stamp\n",
    )
    .unwrap();
    let exec = dir.join("run.sh");
    write_exec(&exec, exec_body);

    let results = dir.join("results");
    SweepOptions {
        repo_root: dir.to_path_buf(),
        source: dir.join("main.cpp"),
        exec,
        testcase_dir: dir.join("testcase"),
        run_log: results.join("sweep_all_runs.csv"),
        aggregate_table: results.join("sweep_agg_by_config.csv"),
        best_table: results.join("sweep_best_by_group.csv"),
        sizes: vec![4],
        threads: vec![2],
        modes: vec![Mode::WithoutPriority, Mode::WithPriority],
        alphas: vec![2],
        betas: vec![2, 4],
        runs: 2,
        timeout: Some(Duration::from_secs(30)),
        allow_large: false,
    }
}

/// Test that the config space honors every divisibility constraint
#[test]
fn test_config_space_constraints() {
    let space = build_config_space(
        &[12],
        &[4],
        &[Mode::WithoutPriority],
        &[2, 3, 5],
        &[2, 3, 4, 6],
    );

    let tuples = &space[&12];
    for t in tuples {
        assert_eq!(12 % t.alpha, 0);
        assert_eq!(12 % t.beta, 0);
        assert_eq!(t.beta % t.alpha, 0);
        assert!(t.beta >= t.alpha);
    }
    // (2,2) (2,4) (2,6) (3,3) (3,6) survive; alpha=5 never divides 12.
    assert_eq!(tuples.len(), 5);
}

/// Test that scheduling interleaves repetitions across tuples
#[test]
fn test_schedule_interleaves_rounds() {
    let space = build_config_space(&[4, 8], &[2], &[Mode::WithoutPriority], &[2], &[2]);
    let schedule = build_schedule(&space, 3);

    assert_eq!(schedule.len(), 6);
    // Every tuple appears once per round before any repeats.
    let first_round: Vec<u32> = schedule[..2].iter().map(|r| r.run_index).collect();
    assert_eq!(first_round, vec![0, 0]);
    let second_round: Vec<u32> = schedule[2..4].iter().map(|r| r.run_index).collect();
    assert_eq!(second_round, vec![1, 1]);
    // Sizes ascend within a round.
    assert!(schedule[0].tuple.size < schedule[1].tuple.size);
}

/// Test aggregate statistics on a mixed sample set
#[test]
fn test_aggregate_statistics() {
    let stats = compute_aggregate(&[10.0, 20.0, f64::NAN, 30.0]);
    assert_eq!(stats.sample_count, 3);
    assert!((stats.mean_ms - 20.0).abs() < 1e-9);
    assert!((stats.stddev_ms - 10.0).abs() < 1e-9);
    assert_eq!(stats.min_ms, 10.0);
    assert_eq!(stats.max_ms, 30.0);
}

/// Test a full sweep: tables written, source restored
#[test]
fn test_full_sweep_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let opts = fake_repo(dir.path(), "#!/bin/sh\necho \"Execution Time: 42.0 ms\"\n");

    run_sweep(&opts).unwrap();

    // 1 size x 2 modes x 2 (alpha,beta) pairs x 2 runs.
    let log = fs::read_to_string(&opts.run_log).unwrap();
    assert_eq!(log.lines().count(), 1 + 8);
    assert_eq!(
        log.lines().next().unwrap(),
        "size,threads,mode,alpha,beta,run_index,latency_ms"
    );

    let agg = fs::read_to_string(&opts.aggregate_table).unwrap();
    assert_eq!(agg.lines().count(), 1 + 4);

    // One best row per (size, threads, mode) group.
    let best = fs::read_to_string(&opts.best_table).unwrap();
    assert_eq!(best.lines().count(), 1 + 2);

    // The matrix artifact was generated for the size under sweep.
    assert!(opts.testcase_dir.join("matrix_4x4.txt").exists());

    // Source restored byte for byte, backup removed.
    let source = fs::read_to_string(&opts.source).unwrap();
    assert!(!source.contains("#define NUM_THREADS"));
    assert!(!dir.path().join("main.cpp.bak_sweep").exists());
}

/// Test that the best table tracks the faster configuration per group
#[test]
fn test_best_table_picks_lower_mean() {
    let dir = tempfile::tempdir().unwrap();
    // Latency depends on BETA: the script reads the compiled-in constant
    // from the mutated source, so (alpha=2, beta=2) beats (alpha=2, beta=4).
    let body = "#!/bin/sh\n\
                beta=$(sed -n 's/#define BETA \\(.*\\)/\\1/p' main.cpp)\n\
                echo \"Execution Time: ${beta}0.0 ms\"\n";
    let mut opts = fake_repo(dir.path(), body);
    opts.modes = vec![Mode::WithoutPriority];

    run_sweep(&opts).unwrap();

    let best = fs::read_to_string(&opts.best_table).unwrap();
    let rows: Vec<&str> = best.lines().collect();
    assert_eq!(
        rows[0],
        "size,threads,mode,best_alpha,best_beta,samples,mean_ms,stddev_ms"
    );
    assert_eq!(rows.len(), 2);
    assert!(
        rows[1].starts_with("4,2,0,2,2,"),
        "beta=2 should win the group: {}",
        rows[1]
    );
    assert!(rows[1].contains(",20.0000,"));
}

/// Test that a timeout records NaN and the sweep keeps going
#[test]
fn test_timeout_records_nan() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = fake_repo(dir.path(), "#!/bin/sh\nsleep 30\n");
    opts.modes = vec![Mode::WithoutPriority];
    opts.betas = vec![2];
    opts.runs = 1;
    opts.timeout = Some(Duration::from_millis(200));

    run_sweep(&opts).unwrap();

    let log = fs::read_to_string(&opts.run_log).unwrap();
    let row = log.lines().nth(1).unwrap();
    assert!(row.ends_with("NaN"), "timed-out run should log NaN: {}", row);
}

/// Test that a second invocation after success is a no-op
#[test]
fn test_completed_sweep_resumes_to_noop() {
    let dir = tempfile::tempdir().unwrap();
    let opts = fake_repo(dir.path(), "#!/bin/sh\necho \"Time taken = 7.5 ms\"\n");

    run_sweep(&opts).unwrap();
    let log_before = fs::read_to_string(&opts.run_log).unwrap();
    let agg_before = fs::read_to_string(&opts.aggregate_table).unwrap();
    let best_before = fs::read_to_string(&opts.best_table).unwrap();

    run_sweep(&opts).unwrap();
    assert_eq!(fs::read_to_string(&opts.run_log).unwrap(), log_before);
    assert_eq!(
        fs::read_to_string(&opts.aggregate_table).unwrap(),
        agg_before
    );
    assert_eq!(fs::read_to_string(&opts.best_table).unwrap(), best_before);
}

/// Test the empty-space exit code surfaces through the error type
#[test]
fn test_empty_space_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = fake_repo(dir.path(), "#!/bin/sh\necho ok\n");
    opts.sizes = vec![5]; // 5 is not divisible by any candidate alpha
    let err = run_sweep(&opts).unwrap_err();
    assert!(matches!(err, SweepError::EmptyConfigSpace));
    assert_eq!(err.exit_code(), 2);
}
