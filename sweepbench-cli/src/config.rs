//! Configuration loading from sweep.toml
//!
//! Sweep defaults can live in a `sweep.toml` discovered by walking up from
//! the current directory; CLI flags override whatever the file provides.
//! Parameter lists accept either comma-separated values (`2,4,8`) or Python
//! range syntax (`start:stop:step`, stop exclusive).

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SweepConfig {
    /// Target program layout inside the repo.
    #[serde(default)]
    pub target: TargetConfig,
    /// Execution knobs.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Result table locations.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where the target's source, binary and datasets live, relative to the
/// repo root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Mutated and rebuilt source file.
    #[serde(default = "default_source")]
    pub source: String,
    /// Compiled binary to execute.
    #[serde(default = "default_exec")]
    pub exec: String,
    /// Directory of matrix artifacts.
    #[serde(default = "default_testcase")]
    pub testcase: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            exec: default_exec(),
            testcase: default_testcase(),
        }
    }
}

fn default_source() -> String {
    "main.cpp".to_string()
}
fn default_exec() -> String {
    "./a.out".to_string()
}
fn default_testcase() -> String {
    "testcase".to_string()
}

/// Execution knobs for the sweep loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Repetitions per tuple.
    #[serde(default = "default_runs")]
    pub runs: u32,
    /// Per-execution wall-clock timeout in seconds (none = unbounded).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Permit generation of very large matrix artifacts.
    #[serde(default)]
    pub allow_large: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            timeout_secs: None,
            allow_large: false,
        }
    }
}

fn default_runs() -> u32 {
    3
}

/// Result table locations, relative to the repo root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding the three tables.
    #[serde(default = "default_results_dir")]
    pub directory: String,
    /// Append-only per-run log.
    #[serde(default = "default_run_log")]
    pub run_log: String,
    /// Append-only per-tuple aggregate table.
    #[serde(default = "default_aggregate")]
    pub aggregate: String,
    /// Fully-rewritten best-per-group table.
    #[serde(default = "default_best")]
    pub best: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_results_dir(),
            run_log: default_run_log(),
            aggregate: default_aggregate(),
            best: default_best(),
        }
    }
}

fn default_results_dir() -> String {
    "results".to_string()
}
fn default_run_log() -> String {
    "sweep_all_runs.csv".to_string()
}
fn default_aggregate() -> String {
    "sweep_agg_by_config.csv".to_string()
}
fn default_best() -> String {
    "sweep_best_by_group.csv".to_string()
}

impl SweepConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Discover `sweep.toml` by walking up from the current directory.
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("sweep.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }
}

/// Parse a comma-separated list of integers.
pub fn parse_list(s: &str) -> anyhow::Result<Vec<u64>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| anyhow::anyhow!("invalid integer in list: {}", part))
        })
        .collect()
}

/// Parse either `start:stop:step` / `start:stop` range syntax (stop
/// exclusive) or a comma-separated list.
pub fn parse_range_or_list(s: &str) -> anyhow::Result<Vec<u64>> {
    let s = s.trim();
    if s.contains(':') {
        let parts: Vec<u64> = s
            .split(':')
            .map(|p| {
                p.trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("invalid range component: {}", p))
            })
            .collect::<anyhow::Result<_>>()?;
        let (start, stop, step) = match parts.as_slice() {
            [a, b] => (*a, *b, 1),
            [a, b, c] => (*a, *b, *c),
            _ => return Err(anyhow::anyhow!("range must be start:stop or start:stop:step")),
        };
        if step == 0 {
            return Err(anyhow::anyhow!("range step must be nonzero"));
        }
        return Ok((start..stop).step_by(step as usize).collect());
    }
    parse_list(s)
}
