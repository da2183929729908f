//! SweepBench binary entry point.
//!
//! Exit codes: 0 on success, 1 for build or I/O failures, 2 when the
//! candidate lists produce an empty config space.

use sweepbench::SweepError;

fn main() {
    if let Err(err) = sweepbench::run() {
        eprintln!("error: {err:#}");
        let code = err
            .downcast_ref::<SweepError>()
            .map(SweepError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
