//! Clean command - removes build artifacts.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::Config;

/// Execute the clean command: remove the bootstrapped tree, the disk
/// image, its report, and any leftover mount directory. Refuses to run
/// while something under the target paths is still mounted.
pub fn cmd_clean(config: &Config) -> Result<()> {
    remove_dir(&config.target_dir)?;
    remove_file(&config.image_path)?;

    let mut report = config.image_path.clone();
    report.set_extension("report.json");
    remove_file(&report)?;

    let mut mnt = config.image_path.clone();
    if let Some(name) = config.image_path.file_name() {
        let mut n = name.to_string_lossy().into_owned();
        n.push_str(".mnt");
        mnt.set_file_name(n);
    }
    remove_dir(&mnt)?;

    println!("Clean complete.");
    Ok(())
}

fn remove_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if crate::cleanup::is_mount_point(path) {
        anyhow::bail!(
            "{} is still mounted; unmount it before cleaning",
            path.display()
        );
    }
    println!("Removing {}...", path.display());
    fs::remove_dir_all(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(())
}

fn remove_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    println!("Removing {}...", path.display());
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(())
}
