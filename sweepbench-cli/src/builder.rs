//! Build Cache / Source Mutator
//!
//! The four build-time constants of the target program live in its source as
//! `#define` lines. Realizing a tuple means rewriting those constants and
//! rebuilding; the cache remembers the last realized [`BuildSignature`] so
//! consecutive tuples that differ only in dataset size reuse the binary.
//!
//! Rewriting is a pure textual transform ([`render_constant`]); the cache
//! owns the single mutable copy of the source for the sweep's duration. The
//! original bytes are preserved by [`crate::guard::SourceGuard`], not here.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use sweepbench_core::BuildSignature;
use thiserror::Error;

/// Errors from constant rewriting and target compilation.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Reading or writing the target source failed.
    #[error("failed to access target source: {0}")]
    SourceIo(#[from] std::io::Error),

    /// The build collaborator exited nonzero. Fatal for the sweep.
    #[error("build failed with {status}:\n{output}")]
    CompileFailed {
        /// Exit status of the failing build command.
        status: std::process::ExitStatus,
        /// Combined captured stdout/stderr of the build.
        output: String,
    },
}

/// Replace every `#define <name> ...` line with the new value, or insert one
/// after the leading include block when the constant is not yet declared.
///
/// Insertion lands immediately after the last `#include` found among the
/// first 100 lines, so a freshly added constant is visible to the whole
/// translation unit without disturbing header order.
pub fn render_constant(source: &str, name: &str, value: &str) -> String {
    let pattern =
        Regex::new(&format!(r"(?m)^(#define\s+{name}\s+).*$")).expect("constant name is an identifier");

    if pattern.is_match(source) {
        return pattern
            .replace_all(source, |caps: &regex::Captures<'_>| {
                format!("{}{}", &caps[1], value)
            })
            .into_owned();
    }

    let mut lines: Vec<&str> = source.lines().collect();
    let mut insert_at = 0;
    for (i, line) in lines.iter().take(100).enumerate() {
        if line.trim_start().starts_with("#include") {
            insert_at = i + 1;
        }
    }
    let declaration = format!("#define {name} {value}");
    lines.insert(insert_at, &declaration);
    lines.join("\n")
}

/// Tracks the last compiled signature and rebuilds the target only on change.
pub struct BuildCache {
    repo_root: PathBuf,
    source: PathBuf,
    last: Option<BuildSignature>,
}

impl BuildCache {
    /// Create a cache with no realized signature; the first
    /// [`ensure_built`](Self::ensure_built) always compiles.
    pub fn new(repo_root: impl Into<PathBuf>, source: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            source: source.into(),
            last: None,
        }
    }

    /// The most recently realized signature, if any.
    pub fn last_signature(&self) -> Option<BuildSignature> {
        self.last
    }

    /// Make sure the target binary matches `sig`.
    ///
    /// Returns `Ok(true)` when a rebuild ran, `Ok(false)` when the cached
    /// binary was reused. The stored signature is only advanced after a
    /// successful build, so a failed compile leaves the cache conservative.
    pub fn ensure_built(&mut self, sig: BuildSignature) -> Result<bool, BuildError> {
        if self.last == Some(sig) {
            return Ok(false);
        }

        let mut text = std::fs::read_to_string(&self.source)?;
        text = render_constant(&text, "NUM_THREADS", &sig.threads.to_string());
        text = render_constant(&text, "ALPHA", &sig.alpha.to_string());
        text = render_constant(&text, "BETA", &sig.beta.to_string());
        text = render_constant(
            &text,
            "USE_PRIORITY_MAIN_QUEUE",
            &sig.mode.as_flag().to_string(),
        );
        std::fs::write(&self.source, text)?;
        tracing::debug!(
            threads = sig.threads,
            mode = %sig.mode,
            alpha = sig.alpha,
            beta = sig.beta,
            "rewrote build constants"
        );

        compile_target(&self.repo_root)?;
        self.last = Some(sig);
        Ok(true)
    }
}

/// Clean and fully rebuild the target via its Makefile.
fn compile_target(repo_root: &Path) -> Result<(), BuildError> {
    // Clean result is advisory; a missing clean target must not kill the sweep.
    let _ = Command::new("make")
        .arg("clean")
        .current_dir(repo_root)
        .output();

    let output = Command::new("make")
        .arg("-j")
        .current_dir(repo_root)
        .output()?;

    if !output.status.success() {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push('\n');
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(BuildError::CompileFailed {
            status: output.status,
            output: combined,
        });
    }

    tracing::info!("compilation OK");
    Ok(())
}
