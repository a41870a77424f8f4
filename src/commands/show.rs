//! Show command - displays information.

use anyhow::Result;

use crate::config::Config;
use crate::target::DistroFamily;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => {
            config.print();
            println!();
            for family in DistroFamily::ALL {
                println!("{} suites: {}", family, family.suites().join(", "));
            }
        }
    }
    Ok(())
}
