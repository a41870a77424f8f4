//! Shared test utilities for debforge tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test environment with a temporary mock rootfs tree.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Mock bootstrapped rootfs directory
    pub rootfs: PathBuf,
    /// Mock image mount directory
    pub image_root: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with temporary directories.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let rootfs = base.join("rootfs");
        let image_root = base.join("image-root");
        fs::create_dir_all(&rootfs).expect("Failed to create rootfs dir");
        fs::create_dir_all(&image_root).expect("Failed to create image-root dir");

        Self {
            _temp_dir: temp_dir,
            rootfs,
            image_root,
        }
    }
}

/// Populate a directory with the shape of a freshly bootstrapped tree.
pub fn create_mock_rootfs(rootfs: &Path) {
    for dir in [
        "etc/apt",
        "usr/bin",
        "usr/sbin",
        "var/lib/dpkg",
        "boot",
        "root",
    ] {
        fs::create_dir_all(rootfs.join(dir)).expect("Failed to create mock dir");
    }
    fs::write(rootfs.join("etc/hostname"), "debforge\n").unwrap();
    fs::write(rootfs.join("usr/bin/dpkg"), "#!/bin/sh\n").unwrap();
    fs::write(rootfs.join("var/lib/dpkg/status"), "").unwrap();
}

/// Assert a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.is_file(), "Expected file to exist: {}", path.display());
}

/// Assert a file exists and contains the given substring.
pub fn assert_file_contains(path: &Path, needle: &str) {
    assert_file_exists(path);
    let content = fs::read_to_string(path).expect("Failed to read file");
    assert!(
        content.contains(needle),
        "Expected {} to contain '{}', got:\n{}",
        path.display(),
        needle,
        content
    );
}

/// Assert a directory exists.
pub fn assert_dir_exists(path: &Path) {
    assert!(path.is_dir(), "Expected directory to exist: {}", path.display());
}
