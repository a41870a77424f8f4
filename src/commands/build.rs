//! Build command - runs the full image build pipeline.
//!
//! Strict dependency order: preflight, target selection, bootstrap,
//! chroot package phase, image materialization. Mandatory steps abort
//! the build with step context; best-effort step failures accumulate as
//! warnings and show up in the final banner.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;

use crate::bootstrap;
use crate::chroot::ChrootSession;
use crate::config::Config;
use crate::image::{self, ImageSize};
use crate::packages::{self, Desktop};
use crate::preflight;
use crate::prompt;
use crate::target::{BuildTarget, DistroFamily};

/// Build options resolved from CLI flags. `None` falls through to the
/// config value and then to an interactive prompt.
#[derive(Debug, Default)]
pub struct BuildOptions {
    pub target_dir: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub size: Option<String>,
    pub family: Option<String>,
    pub suite: Option<String>,
    pub mirror: Option<String>,
    pub arch: Option<String>,
    pub desktop: Option<String>,
    /// Accept a suite name outside the allow-list (trusted as-is).
    pub allow_any_suite: bool,
    /// Stop after the chroot package phase; don't produce a disk image.
    pub skip_image: bool,
    /// Never prompt; missing selections fall back to defaults.
    pub non_interactive: bool,
}

/// Execute the build command.
pub fn cmd_build(config: &Config, opts: BuildOptions) -> Result<()> {
    let build_start = Instant::now();
    println!("=== debforge build ===\n");

    preflight::require_root()?;
    preflight::run_preflight_or_fail().context("preflight")?;

    let target_dir = opts
        .target_dir
        .clone()
        .unwrap_or_else(|| config.target_dir.clone());
    let image_path = opts.image.clone().unwrap_or_else(|| config.image_path.clone());
    let size: ImageSize = opts
        .size
        .as_deref()
        .unwrap_or(&config.image_size)
        .parse()
        .context("parsing image size")?;

    let target = select_target(config, &opts).context("target selection")?;
    println!(
        "\nTarget: {} {} ({}) from {}",
        target.family, target.suite, target.architecture, target.mirror_url
    );

    println!("\n=== Bootstrap ===");
    bootstrap::bootstrap(&target, &target_dir).context("bootstrap")?;

    println!("\n=== Package installation ===");
    let mut warnings = Vec::new();
    let mut session = ChrootSession::begin(&target_dir).context("starting chroot session")?;

    let package_result = run_package_phase(&session, config, &opts, &mut warnings);
    session.end();
    package_result.context("package installation")?;

    if opts.skip_image {
        println!("\n[SKIP] Image creation skipped (--skip-image)");
        println!("  Root filesystem: {}", target_dir.display());
        print_banner(build_start.elapsed().as_secs_f64(), &warnings);
        return Ok(());
    }

    let outcome =
        image::materialize(&target_dir, &image_path, size).context("image materialization")?;
    warnings.extend(outcome.warnings);

    print_banner(build_start.elapsed().as_secs_f64(), &warnings);
    Ok(())
}

/// Resolve the build target from flags, config, or interactive prompts.
///
/// A suite from the environment is trusted as-is; a suite flag needs
/// `--allow-any-suite` to bypass the allow-list.
fn select_target(config: &Config, opts: &BuildOptions) -> Result<BuildTarget> {
    let family = match opts.family.as_deref().or(config.family.as_deref()) {
        Some(name) => name.parse::<DistroFamily>()?,
        None if opts.non_interactive => {
            println!("No family configured, defaulting to Debian");
            DistroFamily::Debian
        }
        None => {
            let names: Vec<String> =
                DistroFamily::ALL.iter().map(|f| f.to_string()).collect();
            let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let idx = prompt::choose("Select distribution family:", &refs)?;
            DistroFamily::ALL[idx]
        }
    };

    let mut target = if let Some(suite) = opts.suite.as_deref() {
        if opts.allow_any_suite {
            BuildTarget::with_free_suite(family, suite)?
        } else {
            BuildTarget::new(family, suite)?
        }
    } else if let Some(suite) = config.suite.as_deref() {
        // Environment-provided suites are a deliberate operator override.
        BuildTarget::with_free_suite(family, suite)?
    } else if opts.non_interactive {
        BuildTarget::new(family, family.suites()[0])?
    } else {
        let idx = prompt::choose(&format!("Select {} suite:", family), family.suites())?;
        BuildTarget::new(family, family.suites()[idx])?
    };

    if let Some(mirror) = opts.mirror.as_deref().or(config.mirror.as_deref()) {
        target = target.with_mirror(mirror);
    }
    if let Some(arch) = opts.arch.as_deref() {
        target = target.with_arch(arch);
    }
    Ok(target)
}

/// Resolve the desktop choice from flags, config, or an interactive
/// prompt.
fn select_desktop(config: &Config, opts: &BuildOptions) -> Result<Desktop> {
    match opts.desktop.as_deref().or(config.desktop.as_deref()) {
        Some(name) => name.parse(),
        None if opts.non_interactive => Ok(Desktop::None),
        None => {
            let names: Vec<String> = Desktop::ALL.iter().map(|d| d.to_string()).collect();
            let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let idx = prompt::choose("Select desktop environment:", &refs)?;
            Ok(Desktop::ALL[idx])
        }
    }
}

/// Everything that happens inside the live chroot session: index update,
/// baseline, desktop, GUI package browser, maintenance.
fn run_package_phase(
    session: &ChrootSession,
    config: &Config,
    opts: &BuildOptions,
    warnings: &mut Vec<String>,
) -> Result<()> {
    packages::apt_update(session)?;
    packages::install_baseline(session)?;

    let desktop = select_desktop(config, opts)?;
    if packages::install_desktop(session, desktop)?.is_none() && desktop != Desktop::None {
        warnings.push(format!("desktop {} skipped: no candidate available", desktop));
    }

    if opts.non_interactive {
        println!("[SKIP] GUI package browser (non-interactive)");
    } else if let Some(warning) = packages::run_package_browser(session) {
        warnings.push(warning);
    }

    warnings.extend(packages::post_selection_maintenance(session)?);
    Ok(())
}

fn print_banner(total_secs: f64, warnings: &[String]) {
    if total_secs >= 60.0 {
        println!("\n=== Build Complete ({:.1}m) ===", total_secs / 60.0);
    } else {
        println!("\n=== Build Complete ({:.1}s) ===", total_secs);
    }

    if warnings.is_empty() {
        println!("  No warnings.");
    } else {
        println!("  Completed with {} warning(s):", warnings.len());
        for warning in warnings {
            println!("    [WARN] {}", warning);
        }
    }
}
