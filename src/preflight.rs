//! Preflight checks for the image build.
//!
//! Verifies privilege level and host tool availability before any
//! filesystem mutation, and can install the fixed list of host
//! dependency packages. A failed dependency install is fatal — no
//! retries.

use anyhow::{bail, Result};

use crate::process::{self, Cmd};

/// Host tools required for a full build, with their Debian package names.
const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("apt-get", "apt"),
    ("debootstrap", "debootstrap"),
    ("chroot", "coreutils"),
    ("mount", "mount"),
    ("umount", "mount"),
    ("mountpoint", "util-linux"),
    ("losetup", "util-linux"),
    ("blkid", "util-linux"),
    ("parted", "parted"),
    ("mkfs.vfat", "dosfstools"),
    ("mkfs.ext4", "e2fsprogs"),
    ("rsync", "rsync"),
];

/// Optional tools; their absence degrades but does not block the build.
const OPTIONAL_TOOLS: &[(&str, &str, &str)] = &[
    ("kpartx", "kpartx", "Fallback when loop partition nodes are missing"),
    ("xhost", "x11-xserver-utils", "Needed for the GUI package browser step"),
];

/// Fixed host package set installed by `install_host_dependencies`.
const HOST_DEPENDENCY_PACKAGES: &[&str] = &[
    "debootstrap",
    "parted",
    "dosfstools",
    "e2fsprogs",
    "rsync",
    "kpartx",
];

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed.
    Pass,
    /// Check failed - build will fail.
    Fail,
    /// Check passed but with a warning.
    Warn,
}

impl CheckResult {
    fn pass_with(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: Some(details.to_string()),
        }
    }

    fn fail(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            details: Some(details.to_string()),
        }
    }

    fn warn(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warn,
            details: Some(details.to_string()),
        }
    }
}

/// Results of all preflight checks.
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    /// Returns true if all checks passed (no failures).
    pub fn all_passed(&self) -> bool {
        !self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    /// Count of failed checks.
    pub fn fail_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .count()
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("=== Preflight Check Results ===\n");

        for check in &self.checks {
            let status_str = match check.status {
                CheckStatus::Pass => "PASS",
                CheckStatus::Fail => "FAIL",
                CheckStatus::Warn => "WARN",
            };

            print!("  [{}] {}", status_str, check.name);
            if let Some(details) = &check.details {
                println!(": {}", details);
            } else {
                println!();
            }
        }

        let total = self.checks.len();
        let passed = self
            .checks
            .iter()
            .filter(|c| c.status == CheckStatus::Pass)
            .count();
        println!("\nSummary: {}/{} passed", passed, total);
        if self.fail_count() > 0 {
            println!("         {} FAILED - build will not succeed", self.fail_count());
        }
    }
}

/// True when running with root privileges.
pub fn is_root() -> bool {
    // Safety: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Fail fast unless running as root. Checked before any mutation.
pub fn require_root() -> Result<()> {
    if !is_root() {
        bail!("This tool must run as root (mounts, loop devices, chroot). Re-run with sudo.");
    }
    Ok(())
}

/// Run all preflight checks.
pub fn run_preflight() -> PreflightReport {
    let mut checks = Vec::new();

    if is_root() {
        checks.push(CheckResult::pass_with("root privileges", "euid 0"));
    } else {
        checks.push(CheckResult::fail(
            "root privileges",
            "Not running as root - mounts and loop devices will fail",
        ));
    }

    for (tool, package) in REQUIRED_TOOLS {
        match process::which(tool) {
            Some(path) => checks.push(CheckResult::pass_with(tool, &path)),
            None => checks.push(CheckResult::fail(
                tool,
                &format!("Not found. Install '{}' package.", package),
            )),
        }
    }

    for (tool, package, purpose) in OPTIONAL_TOOLS {
        match process::which(tool) {
            Some(path) => checks.push(CheckResult::pass_with(tool, &path)),
            None => checks.push(CheckResult::warn(
                tool,
                &format!("Not found. Install '{}' package. {}", package, purpose),
            )),
        }
    }

    PreflightReport { checks }
}

/// Install the fixed host dependency set via the host's apt.
///
/// Fatal on failure: a host that cannot install its own tooling cannot
/// build the image either.
pub fn install_host_dependencies() -> Result<()> {
    println!("Installing host dependencies: {}", HOST_DEPENDENCY_PACKAGES.join(" "));

    Cmd::new("apt-get")
        .args(["install", "-y"])
        .args(HOST_DEPENDENCY_PACKAGES.iter().copied())
        .env("DEBIAN_FRONTEND", "noninteractive")
        .error_msg("Host dependency install failed")
        .run_streaming()?;

    Ok(())
}

/// Run preflight and bail if any checks fail.
pub fn run_preflight_or_fail() -> Result<()> {
    let report = run_preflight();
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before building.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_tools_table() {
        assert!(!REQUIRED_TOOLS.is_empty());
        for (tool, package) in REQUIRED_TOOLS {
            assert!(!tool.is_empty());
            assert!(!package.is_empty());
        }
        // The host package manager is itself a hard precondition: both the
        // dependency install and the chroot package phase drive it.
        assert!(REQUIRED_TOOLS.iter().any(|(tool, _)| *tool == "apt-get"));
    }

    #[test]
    fn test_report_counts() {
        let report = PreflightReport {
            checks: vec![
                CheckResult::pass_with("a", "ok"),
                CheckResult::fail("b", "missing"),
                CheckResult::warn("c", "degraded"),
            ],
        };

        assert!(!report.all_passed());
        assert_eq!(report.fail_count(), 1);
    }

    #[test]
    fn test_report_all_passed_ignores_warnings() {
        let report = PreflightReport {
            checks: vec![
                CheckResult::pass_with("a", "ok"),
                CheckResult::warn("c", "degraded"),
            ],
        };

        assert!(report.all_passed());
    }
}
