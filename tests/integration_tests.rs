//! Integration tests over the filesystem-facing pieces.
//!
//! These run against mock trees in temporary directories; nothing here
//! mounts, partitions, or needs root.

mod helpers;

use std::fs;

use helpers::{assert_dir_exists, assert_file_contains, create_mock_rootfs, TestEnv};

use debforge::bootstrap::write_sources_list;
use debforge::image::populate::{verify_excluded_empty, write_fstab, EXCLUDED_SUBTREES};
use debforge::target::{BuildTarget, DistroFamily};

#[test]
fn test_sources_list_written_into_tree() {
    let env = TestEnv::new();
    create_mock_rootfs(&env.rootfs);
    let target = BuildTarget::new(DistroFamily::Debian, "bookworm").unwrap();

    write_sources_list(&target, &env.rootfs).unwrap();

    let sources = env.rootfs.join("etc/apt/sources.list");
    assert_file_contains(&sources, "deb http://deb.debian.org/debian bookworm");
    assert_file_contains(&sources, "non-free-firmware");
}

#[test]
fn test_sources_list_ubuntu_has_universe() {
    let env = TestEnv::new();
    let target = BuildTarget::new(DistroFamily::Ubuntu, "noble").unwrap();

    write_sources_list(&target, &env.rootfs).unwrap();

    assert_file_contains(&env.rootfs.join("etc/apt/sources.list"), "noble main universe");
}

#[test]
fn test_fstab_written_into_image_root() {
    let env = TestEnv::new();

    write_fstab(&env.image_root, "aaaa-root", "BBBB-EFI").unwrap();

    let fstab = env.image_root.join("etc/fstab");
    assert_file_contains(&fstab, "UUID=aaaa-root\t/\text4\terrors=remount-ro");
    assert_file_contains(&fstab, "UUID=BBBB-EFI\t/boot/efi\tvfat\tumask=0077");
}

#[test]
fn test_populated_image_passes_exclusion_verification() {
    let env = TestEnv::new();
    // Shape of a correctly populated image: real content plus empty
    // virtual mount points.
    create_mock_rootfs(&env.image_root);
    for subtree in EXCLUDED_SUBTREES {
        fs::create_dir_all(env.image_root.join(subtree)).unwrap();
    }

    verify_excluded_empty(&env.image_root).unwrap();
    assert_dir_exists(&env.image_root.join("proc"));
}

#[test]
fn test_leaked_host_state_fails_verification() {
    let env = TestEnv::new();
    fs::create_dir_all(env.image_root.join("sys/class")).unwrap();
    fs::write(env.image_root.join("sys/class/leak"), "host state").unwrap();

    let err = verify_excluded_empty(&env.image_root).unwrap_err();
    assert!(err.to_string().contains("/sys"));
}
