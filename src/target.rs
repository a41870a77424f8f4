//! Build target selection: distribution family, suite, mirror.
//!
//! The suite lists are finite allow-lists of known-good names; the mirror
//! for each family is a fixed mapping. A free-form suite override exists
//! behind an explicit flag and is validated for non-emptiness only — that
//! path trusts operator input by design.

use anyhow::{bail, Result};
use std::fmt;
use std::str::FromStr;

/// Default architecture for bootstrap and bootloader install.
pub const DEFAULT_ARCH: &str = "amd64";

/// Known-good Debian suites, newest stable first.
pub const DEBIAN_SUITES: &[&str] = &["bookworm", "trixie", "bullseye", "sid"];

/// Known-good Ubuntu suites, newest LTS first.
pub const UBUNTU_SUITES: &[&str] = &["noble", "jammy", "oracular", "plucky"];

const DEBIAN_MIRROR: &str = "http://deb.debian.org/debian";
const UBUNTU_MIRROR: &str = "http://archive.ubuntu.com/ubuntu";

/// Distribution family the image is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistroFamily {
    Debian,
    Ubuntu,
}

impl DistroFamily {
    /// All selectable families, in prompt order.
    pub const ALL: &'static [DistroFamily] = &[DistroFamily::Debian, DistroFamily::Ubuntu];

    /// The finite suite allow-list for this family.
    pub fn suites(&self) -> &'static [&'static str] {
        match self {
            DistroFamily::Debian => DEBIAN_SUITES,
            DistroFamily::Ubuntu => UBUNTU_SUITES,
        }
    }

    /// Fixed mirror URL for this family.
    pub fn mirror(&self) -> &'static str {
        match self {
            DistroFamily::Debian => DEBIAN_MIRROR,
            DistroFamily::Ubuntu => UBUNTU_MIRROR,
        }
    }
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistroFamily::Debian => write!(f, "Debian"),
            DistroFamily::Ubuntu => write!(f, "Ubuntu"),
        }
    }
}

impl FromStr for DistroFamily {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "debian" => Ok(DistroFamily::Debian),
            "ubuntu" => Ok(DistroFamily::Ubuntu),
            other => bail!("Unknown distribution family: {} (expected: debian, ubuntu)", other),
        }
    }
}

/// Immutable (family, suite, mirror, architecture) selection.
///
/// Created once from operator input and never mutated; determines the
/// debootstrap invocation and the target's apt source configuration.
#[derive(Debug, Clone)]
pub struct BuildTarget {
    pub family: DistroFamily,
    pub suite: String,
    pub mirror_url: String,
    pub architecture: String,
}

impl BuildTarget {
    /// Select a target from the family's allow-list.
    ///
    /// Rejects suites outside the enumerated set.
    pub fn new(family: DistroFamily, suite: &str) -> Result<Self> {
        if !family.suites().contains(&suite) {
            bail!(
                "Suite '{}' is not in the {} allow-list ({})",
                suite,
                family,
                family.suites().join(", ")
            );
        }
        Ok(Self {
            family,
            suite: suite.to_string(),
            mirror_url: family.mirror().to_string(),
            architecture: DEFAULT_ARCH.to_string(),
        })
    }

    /// Select a target with an arbitrary suite name, bypassing the
    /// allow-list. Only non-emptiness is checked; the operator is trusted.
    pub fn with_free_suite(family: DistroFamily, suite: &str) -> Result<Self> {
        let suite = suite.trim();
        if suite.is_empty() {
            bail!("Suite override must not be empty");
        }
        Ok(Self {
            family,
            suite: suite.to_string(),
            mirror_url: family.mirror().to_string(),
            architecture: DEFAULT_ARCH.to_string(),
        })
    }

    /// Override the mirror URL (config-driven variant).
    pub fn with_mirror(mut self, mirror: &str) -> Self {
        self.mirror_url = mirror.to_string();
        self
    }

    /// Override the architecture (config-driven variant).
    pub fn with_arch(mut self, arch: &str) -> Self {
        self.architecture = arch.to_string();
        self
    }

    /// Render the target's `/etc/apt/sources.list`.
    ///
    /// References exactly the selected suite and no other suite string.
    pub fn sources_list(&self) -> String {
        match self.family {
            DistroFamily::Debian => format!(
                "deb {} {} main contrib non-free-firmware\n",
                self.mirror_url, self.suite
            ),
            DistroFamily::Ubuntu => {
                format!("deb {} {} main universe\n", self.mirror_url, self.suite)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parse() {
        assert_eq!("debian".parse::<DistroFamily>().unwrap(), DistroFamily::Debian);
        assert_eq!("Ubuntu".parse::<DistroFamily>().unwrap(), DistroFamily::Ubuntu);
        assert!("fedora".parse::<DistroFamily>().is_err());
    }

    #[test]
    fn test_allow_list_rejects_unknown_suite() {
        assert!(BuildTarget::new(DistroFamily::Debian, "warty").is_err());
        assert!(BuildTarget::new(DistroFamily::Ubuntu, "bookworm").is_err());
    }

    #[test]
    fn test_allow_list_accepts_known_suite() {
        let target = BuildTarget::new(DistroFamily::Debian, "bookworm").unwrap();
        assert_eq!(target.suite, "bookworm");
        assert_eq!(target.mirror_url, "http://deb.debian.org/debian");
        assert_eq!(target.architecture, "amd64");
    }

    #[test]
    fn test_free_suite_trusts_operator() {
        let target = BuildTarget::with_free_suite(DistroFamily::Debian, "experimental").unwrap();
        assert_eq!(target.suite, "experimental");
        assert!(BuildTarget::with_free_suite(DistroFamily::Debian, "  ").is_err());
    }

    #[test]
    fn test_sources_list_references_only_selected_suite() {
        let target = BuildTarget::new(DistroFamily::Debian, "bookworm").unwrap();
        let sources = target.sources_list();

        assert!(sources.contains("bookworm"));
        for other in DEBIAN_SUITES.iter().filter(|s| **s != "bookworm") {
            assert!(!sources.contains(other), "unexpected suite {} in sources", other);
        }
    }

    #[test]
    fn test_sources_list_ubuntu_components() {
        let target = BuildTarget::new(DistroFamily::Ubuntu, "noble").unwrap();
        let sources = target.sources_list();

        assert!(sources.starts_with("deb http://archive.ubuntu.com/ubuntu noble"));
        assert!(sources.contains("universe"));
    }

    #[test]
    fn test_mirror_and_arch_overrides() {
        let target = BuildTarget::new(DistroFamily::Ubuntu, "jammy")
            .unwrap()
            .with_mirror("http://mirror.example.com/ubuntu")
            .with_arch("arm64");

        assert_eq!(target.mirror_url, "http://mirror.example.com/ubuntu");
        assert_eq!(target.architecture, "arm64");
        assert!(target.sources_list().contains("mirror.example.com"));
    }
}
