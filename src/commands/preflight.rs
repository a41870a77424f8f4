//! Preflight command - runs preflight checks.

use anyhow::Result;

use crate::preflight;

/// Execute the preflight command.
pub fn cmd_preflight(strict: bool, install_deps: bool) -> Result<()> {
    if install_deps {
        preflight::require_root()?;
        preflight::install_host_dependencies()?;
    }

    if strict {
        preflight::run_preflight_or_fail()?;
    } else {
        let report = preflight::run_preflight();
        report.print();
        if !report.all_passed() {
            println!("Some checks failed. Use --strict to fail with a non-zero exit.");
            println!("Use --install-deps to install the host dependency packages.");
        }
    }
    Ok(())
}
