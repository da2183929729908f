//! Summary Statistics
//!
//! Mean, sample standard deviation (Bessel-corrected), min and max over the
//! latencies collected for one tuple. NaN samples (runs whose measurement
//! could not be parsed) are excluded from the statistic but still count
//! toward the tuple's completion quota upstream.

use serde::{Deserialize, Serialize};

/// Aggregate over one tuple's repetitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Number of samples that carried a real measurement (NaN excluded).
    pub sample_count: usize,
    /// Mean latency in milliseconds; NaN when no sample parsed.
    pub mean_ms: f64,
    /// Bessel-corrected sample standard deviation; zero for a single sample.
    pub stddev_ms: f64,
    /// Fastest observed run; NaN when no sample parsed.
    pub min_ms: f64,
    /// Slowest observed run; NaN when no sample parsed.
    pub max_ms: f64,
}

/// Compute aggregate statistics over one tuple's latency samples.
///
/// NaN entries are dropped before anything is computed. When every sample is
/// NaN the result has `sample_count == 0` and NaN statistics, which
/// serializes cleanly and never compares lower than a real mean.
pub fn compute_aggregate(samples: &[f64]) -> AggregateStats {
    let valid: Vec<f64> = samples.iter().copied().filter(|v| !v.is_nan()).collect();

    if valid.is_empty() {
        return AggregateStats {
            sample_count: 0,
            mean_ms: f64::NAN,
            stddev_ms: f64::NAN,
            min_ms: f64::NAN,
            max_ms: f64::NAN,
        };
    }

    let mean = valid.iter().sum::<f64>() / valid.len() as f64;

    let stddev = if valid.len() < 2 {
        0.0
    } else {
        let variance =
            valid.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (valid.len() - 1) as f64;
        variance.sqrt()
    };

    let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
    let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    AggregateStats {
        sample_count: valid.len(),
        mean_ms: mean,
        stddev_ms: stddev,
        min_ms: min,
        max_ms: max,
    }
}
