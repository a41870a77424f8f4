//! Package installation inside the chroot.
//!
//! Wraps apt invocations against a live `ChrootSession`: index update,
//! the mandatory baseline set, desktop-environment resolution by
//! availability probing, the interactive GUI package browser, and the
//! best-effort post-selection maintenance steps.

use anyhow::Result;
use std::fmt;
use std::str::FromStr;

use crate::chroot::ChrootSession;
use crate::process::{Cmd, StepPolicy};

/// Baseline packages installed into every image, non-interactively.
pub const BASE_PACKAGES: &[&str] = &[
    "ca-certificates",
    "locales",
    "synaptic",
    "xauth",
    "x11-xserver-utils",
];

/// Desktop environment flavors the operator can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desktop {
    Xfce,
    Gnome,
    Kde,
    Lxqt,
    Mate,
    /// Build without a desktop environment.
    None,
}

impl Desktop {
    /// All flavors, in prompt order.
    pub const ALL: &'static [Desktop] = &[
        Desktop::Xfce,
        Desktop::Gnome,
        Desktop::Kde,
        Desktop::Lxqt,
        Desktop::Mate,
        Desktop::None,
    ];

    /// Candidate metapackages in priority order. The lists mix Debian
    /// tasks and Ubuntu metapackages because availability probing, not
    /// the family, decides what installs.
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            Desktop::Xfce => &["task-xfce-desktop", "xubuntu-desktop", "xfce4"],
            Desktop::Gnome => &["task-gnome-desktop", "ubuntu-desktop", "gnome-core"],
            Desktop::Kde => &["task-kde-desktop", "kubuntu-desktop", "plasma-desktop"],
            Desktop::Lxqt => &["task-lxqt-desktop", "lubuntu-desktop", "lxqt"],
            Desktop::Mate => &["task-mate-desktop", "ubuntu-mate-desktop", "mate-desktop-environment"],
            Desktop::None => &[],
        }
    }
}

impl fmt::Display for Desktop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Desktop::Xfce => "XFCE",
            Desktop::Gnome => "GNOME",
            Desktop::Kde => "KDE",
            Desktop::Lxqt => "LXQt",
            Desktop::Mate => "MATE",
            Desktop::None => "none",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Desktop {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "xfce" => Ok(Desktop::Xfce),
            "gnome" => Ok(Desktop::Gnome),
            "kde" | "plasma" => Ok(Desktop::Kde),
            "lxqt" => Ok(Desktop::Lxqt),
            "mate" => Ok(Desktop::Mate),
            "none" => Ok(Desktop::None),
            other => anyhow::bail!(
                "Unknown desktop: {} (expected: xfce, gnome, kde, lxqt, mate, none)",
                other
            ),
        }
    }
}

/// Outcome of desktop metapackage resolution.
#[derive(Debug, Clone)]
pub struct DesktopSelection {
    pub candidates: Vec<String>,
    /// First candidate the package cache reports as available; None means
    /// the desktop step is skipped.
    pub resolved: Option<String>,
}

/// Resolve the first available candidate in priority order.
///
/// The probe is injected so the policy is testable without a chroot; the
/// real probe is a read-only `apt-cache show` inside the session.
pub fn resolve_desktop(
    candidates: &[&str],
    mut available: impl FnMut(&str) -> bool,
) -> DesktopSelection {
    let resolved = candidates
        .iter()
        .find(|name| available(name))
        .map(|name| name.to_string());

    DesktopSelection {
        candidates: candidates.iter().map(|s| s.to_string()).collect(),
        resolved,
    }
}

/// Read-only availability probe via the chroot's package cache.
pub fn apt_cache_probe(session: &ChrootSession) -> impl FnMut(&str) -> bool + '_ {
    |name: &str| {
        session
            .run(&format!("apt-cache show {} > /dev/null 2>&1", name))
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

/// Refresh the package index. Mandatory.
pub fn apt_update(session: &ChrootSession) -> Result<()> {
    println!("Updating package index...");
    session.run_step("apt-get update", "apt-get update", StepPolicy::Mandatory)?;
    Ok(())
}

/// Install named packages non-interactively. Mandatory: apt exits
/// non-zero if any name is unresolvable.
pub fn apt_install(session: &ChrootSession, packages: &[&str]) -> Result<()> {
    println!("Installing: {}", packages.join(" "));
    session.run_step(
        &format!("apt-get install -y {}", packages.join(" ")),
        "package install",
        StepPolicy::Mandatory,
    )?;
    Ok(())
}

/// Install the fixed baseline set.
pub fn install_baseline(session: &ChrootSession) -> Result<()> {
    apt_install(session, BASE_PACKAGES)
}

/// Resolve and install the chosen desktop environment.
///
/// Skips with a warning (never fails the build) when no candidate is
/// available; a resolved candidate that then fails to install is fatal,
/// because the operator explicitly requested it.
pub fn install_desktop(session: &ChrootSession, desktop: Desktop) -> Result<Option<String>> {
    if desktop == Desktop::None {
        println!("[SKIP] No desktop environment requested");
        return Ok(None);
    }

    println!("Resolving {} metapackage...", desktop);
    let selection = resolve_desktop(desktop.candidates(), apt_cache_probe(session));

    match selection.resolved {
        Some(ref package) => {
            println!("  Resolved to: {}", package);
            apt_install(session, &[package])?;
            Ok(selection.resolved)
        }
        None => {
            eprintln!(
                "  [WARN] No {} candidate available ({}), skipping desktop install",
                desktop,
                selection.candidates.join(", ")
            );
            Ok(None)
        }
    }
}

/// Temporary local display-server access grant for the GUI browser.
///
/// Revocation is unconditional: it runs on Drop, so the grant/revoke pair
/// holds on every path including GUI launch failure.
struct DisplayGrant;

impl DisplayGrant {
    fn acquire() -> Option<Self> {
        let granted = Cmd::new("xhost")
            .arg("+local:root")
            .allow_fail()
            .run()
            .map(|r| r.success())
            .unwrap_or(false);
        if granted {
            Some(Self)
        } else {
            None
        }
    }
}

impl Drop for DisplayGrant {
    fn drop(&mut self) {
        let _ = Cmd::new("xhost").arg("-local:root").allow_fail().run();
    }
}

/// Launch the GUI package browser inside the chroot. Best-effort: a
/// missing display or a failed launch is a warning, not a build failure.
pub fn run_package_browser(session: &ChrootSession) -> Option<String> {
    if std::env::var("DISPLAY").is_err() {
        let warning = "No DISPLAY available, skipping GUI package browser".to_string();
        eprintln!("  [WARN] {}", warning);
        return Some(warning);
    }

    let _grant = match DisplayGrant::acquire() {
        Some(grant) => grant,
        None => {
            let warning = "Could not grant local display access (xhost)".to_string();
            eprintln!("  [WARN] {}", warning);
            return Some(warning);
        }
    };

    println!("Launching package browser (close it to continue the build)...");
    match session.run_gui("synaptic") {
        Ok(status) if status.success() => None,
        Ok(status) => {
            let warning = format!(
                "Package browser exited with code {}",
                status.code().unwrap_or(-1)
            );
            eprintln!("  [WARN] {}", warning);
            Some(warning)
        }
        Err(e) => {
            let warning = format!("Package browser failed to launch: {}", e);
            eprintln!("  [WARN] {}", warning);
            Some(warning)
        }
    }
    // _grant drops here, revoking the access grant on every path.
}

/// Post-selection maintenance: refresh, upgrade, dist-upgrade, orphan
/// removal, cache cleanup. Each step independently best-effort.
pub fn post_selection_maintenance(session: &ChrootSession) -> Result<Vec<String>> {
    println!("Running post-selection maintenance...");
    let steps = [
        ("apt-get update", "index refresh"),
        ("apt-get upgrade -y", "upgrade"),
        ("apt-get dist-upgrade -y", "dist-upgrade"),
        ("apt-get autoremove -y", "orphan removal"),
        ("apt-get clean", "cache cleanup"),
    ];

    let mut warnings = Vec::new();
    for (command, label) in steps {
        if let Some(warning) = session.run_step(command, label, StepPolicy::BestEffort)? {
            warnings.push(warning);
        }
    }
    Ok(warnings)
}
