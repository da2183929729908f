//! Execution Harness
//!
//! Runs the currently-built target binary against one dataset artifact and
//! extracts a latency measurement from its combined output. The measurement
//! contract is purely textual: a line containing "Execution Time" or "Time
//! taken" followed by a number and a millisecond unit, case-insensitive; the
//! first match is authoritative.
//!
//! Everything that can go wrong in a single run — no matching line, a
//! nonzero exit, a wall-clock timeout — degrades to [`RunOutcome::Unparsed`]
//! so the sweep keeps moving. Only spawn-level IO errors propagate.

use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How many trailing output lines to surface when a measurement is missing.
const TAIL_LINES: usize = 40;

/// Poll interval while waiting on the child with a timeout.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Errors from launching the target binary.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The binary could not be spawned or waited on.
    #[error("failed to run target binary: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A latency measurement was extracted from the output.
    Measured(f64),
    /// No measurement line was found (parse failure, timeout, or crash).
    Unparsed {
        /// Tail of the combined output, for operator inspection.
        tail: String,
    },
}

/// Invokes the compiled target and parses its timing output.
pub struct ExecutionHarness {
    exec_path: PathBuf,
    work_dir: PathBuf,
    timeout: Option<Duration>,
    time_re: Regex,
}

impl ExecutionHarness {
    /// Create a harness for the binary at `exec_path`, run from `work_dir`.
    pub fn new(
        exec_path: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            exec_path: exec_path.into(),
            work_dir: work_dir.into(),
            timeout,
            time_re: Regex::new(r"(?i)(?:Execution\s*Time|Time\s*taken)\D*([0-9]+(?:\.[0-9]+)?)\s*ms")
                .expect("timing pattern is valid"),
        }
    }

    /// Run the binary with `dataset` as its sole positional argument.
    ///
    /// A measurement that parses is accepted regardless of exit status; the
    /// timing contract is the only channel the orchestrator trusts.
    pub fn run(&self, dataset: &Path) -> Result<RunOutcome, HarnessError> {
        tracing::debug!(
            exec = %self.exec_path.display(),
            dataset = %dataset.display(),
            cwd = %self.work_dir.display(),
            "launching target"
        );

        let mut child = Command::new(&self.exec_path)
            .arg(dataset)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain both pipes on threads so a chatty target cannot deadlock
        // against a full pipe buffer while we wait on it.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_thread = std::thread::spawn(move || read_all(stdout));
        let err_thread = std::thread::spawn(move || read_all(stderr));

        let timed_out = self.wait_with_timeout(&mut child)?;

        let mut combined = out_thread.join().unwrap_or_default();
        combined.push('\n');
        combined.push_str(&err_thread.join().unwrap_or_default());

        if timed_out {
            tracing::warn!(timeout = ?self.timeout, "target run timed out");
            return Ok(RunOutcome::Unparsed {
                tail: tail_of(&combined),
            });
        }

        match self.time_re.captures(&combined) {
            Some(caps) => match caps[1].parse::<f64>() {
                Ok(ms) => Ok(RunOutcome::Measured(ms)),
                Err(_) => Ok(RunOutcome::Unparsed {
                    tail: tail_of(&combined),
                }),
            },
            None => Ok(RunOutcome::Unparsed {
                tail: tail_of(&combined),
            }),
        }
    }

    /// Wait for the child, enforcing the optional deadline.
    ///
    /// Returns `Ok(true)` when the child was killed for exceeding it.
    fn wait_with_timeout(&self, child: &mut Child) -> Result<bool, HarnessError> {
        let Some(timeout) = self.timeout else {
            child.wait()?;
            return Ok(false);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if child.try_wait()?.is_some() {
                return Ok(false);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(true);
            }
            std::thread::sleep(WAIT_POLL);
        }
    }

    /// Extract a measurement from already-captured output (exposed for the
    /// orchestrator's diagnostics and for tests).
    pub fn parse_output(&self, output: &str) -> Option<f64> {
        self.time_re
            .captures(output)
            .and_then(|caps| caps[1].parse::<f64>().ok())
    }
}

fn read_all(pipe: Option<impl Read>) -> String {
    let mut buf = String::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_string(&mut buf);
    }
    buf
}

/// Last [`TAIL_LINES`] lines of the combined output.
fn tail_of(output: &str) -> String {
    let lines: Vec<&str> = output.trim().lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join("\n")
}
