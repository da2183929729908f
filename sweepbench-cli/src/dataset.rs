//! Dataset Artifacts
//!
//! The target binary consumes a size-indexed matrix file,
//! `testcase/matrix_{n}x{n}.txt`. Missing artifacts are generated
//! deterministically (seeded by size) so two hosts sweeping the same sizes
//! feed the target identical inputs. Sizes above the generation ceiling are
//! left for external provisioning unless explicitly allowed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Largest size generated without `--allow-large`.
const MAX_GENERATE_SIZE: u64 = 100_000_000;

/// Path of the matrix artifact for size `n` under `testcase_dir`.
pub fn matrix_path(testcase_dir: &Path, n: u64) -> PathBuf {
    testcase_dir.join(format!("matrix_{n}x{n}.txt"))
}

/// Ensure the artifact for size `n` exists, generating it when permitted.
///
/// Returns the artifact path whether or not it exists; a size that was
/// skipped for being too large fails later only if the sweep actually
/// needs it, matching the advisory nature of this step.
pub fn generate_if_missing(
    testcase_dir: &Path,
    n: u64,
    allow_large: bool,
) -> std::io::Result<PathBuf> {
    let path = matrix_path(testcase_dir, n);
    if path.exists() {
        return Ok(path);
    }
    if !allow_large && n > MAX_GENERATE_SIZE {
        tracing::warn!(
            size = n,
            path = %path.display(),
            "matrix missing and too large to auto-generate; create it externally or pass --allow-large"
        );
        return Ok(path);
    }

    std::fs::create_dir_all(testcase_dir)?;
    tracing::info!(size = n, path = %path.display(), "generating deterministic matrix");

    // Per-size seed keeps artifacts reproducible across hosts and reruns.
    let mut rng = StdRng::seed_from_u64(n.wrapping_mul(100_000).wrapping_add(n));
    let file = std::fs::File::create(&path)?;
    let mut writer = BufWriter::new(file);
    for _ in 0..n {
        for j in 0..n {
            let v: f64 = rng.gen::<f64>() - 0.5;
            if j + 1 == n {
                writeln!(writer, "{v:.6}")?;
            } else {
                write!(writer, "{v:.6} ")?;
            }
        }
    }
    writer.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_square_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = generate_if_missing(dir.path(), 4, false).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = content.lines().collect();
        assert_eq!(rows.len(), 4);
        for row in rows {
            assert_eq!(row.split_whitespace().count(), 4);
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let pa = generate_if_missing(a.path(), 6, false).unwrap();
        let pb = generate_if_missing(b.path(), 6, false).unwrap();
        assert_eq!(
            std::fs::read(&pa).unwrap(),
            std::fs::read(&pb).unwrap()
        );
    }

    #[test]
    fn test_existing_artifact_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = matrix_path(dir.path(), 4);
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(&path, "sentinel").unwrap();

        let out = generate_if_missing(dir.path(), 4, false).unwrap();
        assert_eq!(out, path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "sentinel");
    }

    #[test]
    fn test_values_are_centered() {
        let dir = tempfile::tempdir().unwrap();
        let path = generate_if_missing(dir.path(), 8, false).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        for value in content.split_whitespace() {
            let v: f64 = value.parse().unwrap();
            assert!((-0.5..0.5).contains(&v), "value out of range: {v}");
        }
    }
}
