//! Configuration management.
//!
//! Reads configuration from a .env file and environment variables;
//! environment variables take precedence over the .env file, and CLI
//! flags take precedence over both.

use std::path::PathBuf;

/// Default chroot target directory.
pub const DEFAULT_TARGET_DIR: &str = "/var/tmp/debforge/rootfs";
/// Default output image path.
pub const DEFAULT_IMAGE_PATH: &str = "/var/tmp/debforge/debforge.img";
/// Default image size.
pub const DEFAULT_IMAGE_SIZE: &str = "8G";

/// debforge configuration with defaults.
///
/// Keys: `DEBFORGE_TARGET_DIR`, `DEBFORGE_IMAGE`, `DEBFORGE_IMAGE_SIZE`,
/// `DEBFORGE_FAMILY`, `DEBFORGE_SUITE`, `DEBFORGE_MIRROR`,
/// `DEBFORGE_DESKTOP`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the root filesystem is bootstrapped into.
    pub target_dir: PathBuf,
    /// Path of the raw disk image to produce.
    pub image_path: PathBuf,
    /// Image size string (e.g. "8G").
    pub image_size: String,
    /// Distribution family name, if preconfigured.
    pub family: Option<String>,
    /// Suite name, if preconfigured. Trusted as-is (free-form override).
    pub suite: Option<String>,
    /// Mirror URL override, if any.
    pub mirror: Option<String>,
    /// Desktop environment name, if preconfigured.
    pub desktop: Option<String>,
}

impl Config {
    /// Load configuration from the environment (dotenvy has already merged
    /// the .env file into the process environment by the time this runs).
    pub fn load() -> Self {
        let get = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            target_dir: get("DEBFORGE_TARGET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_DIR)),
            image_path: get("DEBFORGE_IMAGE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_PATH)),
            image_size: get("DEBFORGE_IMAGE_SIZE").unwrap_or_else(|| DEFAULT_IMAGE_SIZE.into()),
            family: get("DEBFORGE_FAMILY"),
            suite: get("DEBFORGE_SUITE"),
            mirror: get("DEBFORGE_MIRROR"),
            desktop: get("DEBFORGE_DESKTOP"),
        }
    }

    /// Print configuration for `show config`.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  DEBFORGE_TARGET_DIR: {}", self.target_dir.display());
        println!("  DEBFORGE_IMAGE: {}", self.image_path.display());
        println!("  DEBFORGE_IMAGE_SIZE: {}", self.image_size);
        println!("  DEBFORGE_FAMILY: {}", self.family.as_deref().unwrap_or("(prompt)"));
        println!("  DEBFORGE_SUITE: {}", self.suite.as_deref().unwrap_or("(prompt)"));
        println!("  DEBFORGE_MIRROR: {}", self.mirror.as_deref().unwrap_or("(family default)"));
        println!("  DEBFORGE_DESKTOP: {}", self.desktop.as_deref().unwrap_or("(prompt)"));
    }
}
