//! Root filesystem bootstrap via debootstrap.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::process::Cmd;
use crate::target::BuildTarget;

/// Populate a minimal root filesystem tree for the target.
///
/// Destructive precondition: an existing target directory is destroyed and
/// recreated. Bootstrap failure is fatal; no partial-bootstrap recovery.
pub fn bootstrap(target: &BuildTarget, dir: &Path) -> Result<()> {
    if dir.exists() {
        println!("Removing existing target directory {}...", dir.display());
        fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to remove {}", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    println!(
        "Bootstrapping {} {} ({}) into {}...",
        target.family, target.suite, target.architecture, dir.display()
    );

    Cmd::new("debootstrap")
        .arg(format!("--arch={}", target.architecture))
        .arg(&target.suite)
        .arg_path(dir)
        .arg(&target.mirror_url)
        .error_msg("debootstrap failed")
        .run_streaming()?;

    write_sources_list(target, dir)?;

    Ok(())
}

/// Write the target's apt source configuration.
pub fn write_sources_list(target: &BuildTarget, dir: &Path) -> Result<()> {
    let apt_dir = dir.join("etc/apt");
    fs::create_dir_all(&apt_dir)
        .with_context(|| format!("Failed to create {}", apt_dir.display()))?;
    fs::write(apt_dir.join("sources.list"), target.sources_list())
        .context("Failed to write sources.list")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::DistroFamily;
    use tempfile::TempDir;

    #[test]
    fn test_write_sources_list() {
        let tmp = TempDir::new().unwrap();
        let target = BuildTarget::new(DistroFamily::Debian, "bookworm").unwrap();

        write_sources_list(&target, tmp.path()).unwrap();

        let written = fs::read_to_string(tmp.path().join("etc/apt/sources.list")).unwrap();
        assert_eq!(written, target.sources_list());
        assert!(written.contains("bookworm"));
    }
}
