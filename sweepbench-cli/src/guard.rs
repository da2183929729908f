//! Crash-Safety Source Guard
//!
//! The sweep mutates the target source in place for every new build
//! signature. The guard duplicates the pristine source to a backup before
//! anything is rewritten and moves it back on every exit path: normal
//! completion, fatal build failure, an error unwinding through the
//! orchestrator, or a panic (via `Drop`).
//!
//! If the process dies too abruptly for `Drop` to run, the backup file is
//! left behind; the next guard installation detects it and restores first,
//! so the source is byte-identical again on the next orderly pass.

use std::path::{Path, PathBuf};

/// Suffix appended to the target source path for the backup copy.
const BACKUP_SUFFIX: &str = ".bak_sweep";

/// Owns the backup copy of the target source for the sweep's duration.
pub struct SourceGuard {
    source: PathBuf,
    backup: PathBuf,
    restored: bool,
}

impl SourceGuard {
    /// Back up `source` and arm the guard.
    ///
    /// A stale backup from a previous aborted sweep is restored before the
    /// new backup is taken, so the copy always captures pre-sweep content.
    pub fn install(source: impl Into<PathBuf>) -> std::io::Result<Self> {
        let source = source.into();
        let backup = backup_path(&source);

        if backup.exists() {
            tracing::warn!(
                backup = %backup.display(),
                "found stale backup from an interrupted sweep; restoring it first"
            );
            std::fs::rename(&backup, &source)?;
        }

        std::fs::copy(&source, &backup)?;
        tracing::info!(
            source = %source.display(),
            backup = %backup.display(),
            "backed up target source"
        );

        Ok(Self {
            source,
            backup,
            restored: false,
        })
    }

    /// Where the pristine copy lives while the sweep runs.
    pub fn backup_location(&self) -> &Path {
        &self.backup
    }

    /// Move the backup over the (possibly mutated) source.
    ///
    /// Idempotent; the `Drop` fallback becomes a no-op after an explicit
    /// restore. On failure the backup path is reported so the operator can
    /// recover by hand rather than losing the original content.
    pub fn restore(&mut self) -> std::io::Result<()> {
        if self.restored {
            return Ok(());
        }
        match std::fs::rename(&self.backup, &self.source) {
            Ok(()) => {
                self.restored = true;
                tracing::info!(source = %self.source.display(), "restored target source");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    backup = %self.backup.display(),
                    error = %e,
                    "could not restore target source; recover manually from the backup"
                );
                Err(e)
            }
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn backup_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}
