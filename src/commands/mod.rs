//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `build` - Run the full image build pipeline
//! - `preflight` - Run preflight checks
//! - `clean` - Remove build artifacts
//! - `show` - Display information

pub mod build;
pub mod clean;
mod preflight;
pub mod show;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
