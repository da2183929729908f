#![warn(missing_docs)]
//! SweepBench Core - Parameter Space and Scheduling
//!
//! Pure data model for the sweep engine: parameter tuples, build signatures,
//! config-space construction under divisibility constraints, and the
//! interleaved run schedule. Nothing in this crate touches the filesystem or
//! spawns processes; everything is deterministic given its inputs.

mod schedule;
mod space;

pub use schedule::{ScheduledRun, build_schedule};
pub use space::{
    BuildSignature, ConfigSpace, InvalidMode, Mode, ParameterTuple, build_config_space,
};
