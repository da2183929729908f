#![warn(missing_docs)]
//! SweepBench Stats - Sample Aggregation
//!
//! Statistics over the repeated latency measurements of one parameter tuple.
//! Missing measurements are carried through the pipeline as NaN so that no
//! layer needs a special "failed run" representation; this crate is where
//! they are finally excluded from the numeric summary.

mod summary;

pub use summary::{AggregateStats, compute_aggregate};
