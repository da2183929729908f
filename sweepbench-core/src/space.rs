//! Parameter Space Construction
//!
//! Enumerates the valid (size, threads, mode, alpha, beta) tuples for a
//! sweep. A tuple is valid when the scheduling granularity parameters divide
//! cleanly: `beta >= alpha`, `beta % alpha == 0`, and both divide the dataset
//! size. Tuples are grouped by dataset size; the groups drive the interleaved
//! schedule.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Task-queue mode of the target program.
///
/// Compiled into the target via the `USE_PRIORITY_MAIN_QUEUE` constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Plain FIFO main queue (`USE_PRIORITY_MAIN_QUEUE 0`)
    WithoutPriority,
    /// Priority main queue (`USE_PRIORITY_MAIN_QUEUE 1`)
    WithPriority,
}

impl Mode {
    /// The numeric value written into the target source.
    pub fn as_flag(self) -> u8 {
        match self {
            Mode::WithoutPriority => 0,
            Mode::WithPriority => 1,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_flag())
    }
}

/// Error for a mode value outside {0, 1}.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid mode {0}: expected 0 (without priority) or 1 (with priority)")]
pub struct InvalidMode(pub u64);

impl TryFrom<u64> for Mode {
    type Error = InvalidMode;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Mode::WithoutPriority),
            1 => Ok(Mode::WithPriority),
            other => Err(InvalidMode(other)),
        }
    }
}

/// One fully specified sweep configuration, identifying a measurement bucket.
///
/// Immutable once constructed; equality and hashing cover all five fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterTuple {
    /// Dataset (matrix) size N for an NxN input.
    pub size: u64,
    /// Worker thread count compiled into the target.
    pub threads: u64,
    /// Task-queue mode compiled into the target.
    pub mode: Mode,
    /// Scheduling granularity lower parameter.
    pub alpha: u64,
    /// Scheduling granularity upper parameter.
    pub beta: u64,
}

impl ParameterTuple {
    /// The subset of parameters that require recompiling the target.
    pub fn build_signature(&self) -> BuildSignature {
        BuildSignature {
            threads: self.threads,
            mode: self.mode,
            alpha: self.alpha,
            beta: self.beta,
        }
    }
}

impl fmt::Display for ParameterTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size={} threads={} mode={} alpha={} beta={}",
            self.size, self.threads, self.mode, self.alpha, self.beta
        )
    }
}

/// Build-time parameters of a tuple. Consecutive scheduled tuples sharing a
/// signature reuse the compiled binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildSignature {
    /// Worker thread count (`NUM_THREADS`).
    pub threads: u64,
    /// Task-queue mode (`USE_PRIORITY_MAIN_QUEUE`).
    pub mode: Mode,
    /// Granularity lower parameter (`ALPHA`).
    pub alpha: u64,
    /// Granularity upper parameter (`BETA`).
    pub beta: u64,
}

/// Valid tuples grouped by dataset size, in ascending size order.
pub type ConfigSpace = BTreeMap<u64, Vec<ParameterTuple>>;

/// Enumerate all valid parameter tuples, grouped by dataset size.
///
/// A size whose candidates all fail the divisibility constraints contributes
/// an empty group (omitted from the map). An overall-empty space is valid
/// output here; the caller treats it as fatal because there is nothing to run.
pub fn build_config_space(
    sizes: &[u64],
    threads: &[u64],
    modes: &[Mode],
    alphas: &[u64],
    betas: &[u64],
) -> ConfigSpace {
    let mut space = ConfigSpace::new();
    for &n in sizes {
        for &t in threads {
            for &mode in modes {
                for &a in alphas {
                    for &b in betas {
                        if b >= a && a > 0 && b % a == 0 && n % a == 0 && n % b == 0 {
                            space.entry(n).or_default().push(ParameterTuple {
                                size: n,
                                threads: t,
                                mode,
                                alpha: a,
                                beta: b,
                            });
                        }
                    }
                }
            }
        }
    }
    space
}
