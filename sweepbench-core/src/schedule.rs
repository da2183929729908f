//! Run Scheduling
//!
//! Linearizes the grouped config space into an execution order that
//! interleaves dataset sizes across repetition rounds. Running all
//! repetitions of one tuple back-to-back would confound measurements with
//! transient cache and thermal state; spreading each round across every size
//! amortizes that bias over the whole sweep.
//!
//! The schedule is a pure function of its inputs: identical inputs yield a
//! byte-identical sequence, which is what makes resumption planning (diffing
//! the run log against the schedule) exact.

use crate::space::{ConfigSpace, ParameterTuple};
use serde::{Deserialize, Serialize};

/// One planned execution: a tuple tagged with its repetition round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduledRun {
    /// The configuration to build and run.
    pub tuple: ParameterTuple,
    /// Zero-based repetition counter within the tuple's quota.
    pub run_index: u32,
}

/// Build the interleaved execution order.
///
/// For round r in 0..runs, iterate sizes ascending (the map's native order)
/// and emit each size's tuples in construction order with `run_index = r`.
/// The result has length `runs * total_tuple_count`.
pub fn build_schedule(space: &ConfigSpace, runs: u32) -> Vec<ScheduledRun> {
    let total: usize = space.values().map(Vec::len).sum();
    let mut order = Vec::with_capacity(total * runs as usize);
    for r in 0..runs {
        for tuples in space.values() {
            for &tuple in tuples {
                order.push(ScheduledRun {
                    tuple,
                    run_index: r,
                });
            }
        }
    }
    order
}
