//! Native-Library Provisioning
//!
//! The target program links against TBB. This step is best-effort and not
//! part of sweep correctness: probe whether a trivial TBB program compiles
//! and runs; if not, attempt a distro package install; if that still does
//! not help, warn and continue — the build failure, if any, will surface
//! with full output when the first tuple compiles.

use std::io::Write;
use std::process::Command;

const PROBE_SOURCE: &str = r#"
#include <tbb/tbb.h>
#include <cstdio>
int main(){ tbb::parallel_for(0, 1000, [](int){}); std::puts("tbb-ok"); return 0; }
"#;

/// Probe for a usable TBB toolchain, attempting installation when absent.
pub fn ensure_tbb() {
    if !cfg!(target_os = "linux") {
        tracing::debug!("provisioning only attempted on Linux; skipping");
        return;
    }
    if probe_tbb() {
        tracing::debug!("TBB probe succeeded");
        return;
    }

    tracing::info!("TBB not usable; attempting package install");
    try_package_install();

    if !probe_tbb() {
        tracing::warn!(
            "TBB still not usable after install attempt; builds may fail \
             (install libtbb-dev / tbb-devel manually)"
        );
    }
}

/// Compile and run a minimal TBB program in a scratch directory.
fn probe_tbb() -> bool {
    let Ok(dir) = tempfile::tempdir() else {
        return false;
    };
    let src = dir.path().join("probe.cpp");
    let bin = dir.path().join("probe");

    let written = std::fs::File::create(&src)
        .and_then(|mut f| f.write_all(PROBE_SOURCE.as_bytes()))
        .is_ok();
    if !written {
        return false;
    }

    let cxx = ["c++", "g++"]
        .iter()
        .find(|c| which(c))
        .copied()
        .unwrap_or("c++");

    let compiled = Command::new(cxx)
        .args(["-std=gnu++17", "-O2"])
        .arg(&src)
        .arg("-o")
        .arg(&bin)
        .arg("-ltbb")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !compiled {
        return false;
    }

    Command::new(&bin)
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains("tbb-ok"))
        .unwrap_or(false)
}

/// Try the first available distro package manager. Failures are logged and
/// otherwise ignored.
fn try_package_install() {
    let attempts: &[(&str, &[&[&str]])] = &[
        ("apt-get", &[&["update"], &["install", "-y", "libtbb-dev"]]),
        ("dnf", &[&["install", "-y", "tbb-devel"]]),
        ("yum", &[&["install", "-y", "tbb-devel"]]),
        ("zypper", &[&["install", "-y", "tbb-devel"]]),
        ("pacman", &[&["-Sy", "--noconfirm", "tbb"]]),
    ];

    for (manager, command_sets) in attempts {
        if !which(manager) {
            continue;
        }
        for args in *command_sets {
            let result = run_privileged(manager, args);
            if let Err(e) = result {
                tracing::warn!(manager, error = %e, "package install attempt failed");
            }
        }
        return;
    }
    tracing::warn!("no supported package manager found; cannot install TBB");
}

/// Run a package-manager command, preferring non-interactive sudo when root
/// is required but trying the bare command first.
fn run_privileged(program: &str, args: &[&str]) -> std::io::Result<()> {
    let direct = Command::new(program).args(args).output()?;
    if direct.status.success() {
        return Ok(());
    }
    let output = Command::new("sudo")
        .arg("-n")
        .arg(program)
        .args(args)
        .output()?;
    if !output.status.success() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    Ok(())
}

fn which(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
