//! Unit tests over the pure pieces of the build pipeline.
//!
//! These exercise selection, planning, and rendering logic in isolation;
//! nothing here mounts, partitions, or needs root.

use std::path::{Path, PathBuf};

use debforge::chroot::{bootloader_mount_plan, package_mount_plan, MountKind};
use debforge::cleanup::unwind_mounts;
use debforge::image::partition::parted_args;
use debforge::image::populate::{render_fstab, rsync_args, EXCLUDED_SUBTREES};
use debforge::image::ImageSize;
use debforge::packages::{resolve_desktop, Desktop};
use debforge::prompt::select_index;
use debforge::target::{BuildTarget, DistroFamily};

// =============================================================================
// Target selection
// =============================================================================

#[test]
fn test_sources_list_names_only_the_selected_suite() {
    for family in DistroFamily::ALL {
        for suite in family.suites() {
            let target = BuildTarget::new(*family, suite).unwrap();
            let sources = target.sources_list();

            assert!(sources.contains(suite), "missing {} in sources", suite);
            for other in family.suites().iter().filter(|s| *s != suite) {
                assert!(
                    !sources.contains(other),
                    "{} sources for {} unexpectedly mentions {}",
                    family,
                    suite,
                    other
                );
            }
        }
    }
}

#[test]
fn test_suite_allow_list_is_closed() {
    assert!(BuildTarget::new(DistroFamily::Debian, "noble").is_err());
    assert!(BuildTarget::new(DistroFamily::Ubuntu, "sid").is_err());
    assert!(BuildTarget::new(DistroFamily::Debian, "").is_err());
}

#[test]
fn test_free_suite_override_checks_non_emptiness_only() {
    assert!(BuildTarget::with_free_suite(DistroFamily::Debian, "experimental").is_ok());
    assert!(BuildTarget::with_free_suite(DistroFamily::Debian, "\t ").is_err());
}

#[test]
fn test_prompt_selection_is_index_or_name() {
    let options = ["bookworm", "trixie", "bullseye", "sid"];
    assert_eq!(select_index(&options, "2"), Some(1));
    assert_eq!(select_index(&options, "SID"), Some(3));
    assert_eq!(select_index(&options, "5"), None);
    assert_eq!(select_index(&options, "warty"), None);
}

// =============================================================================
// Mount plans and unwind ordering
// =============================================================================

#[test]
fn test_package_mount_plan_shape() {
    let plan = package_mount_plan(Path::new("/work/rootfs"));

    assert_eq!(plan.len(), 4);
    // Binds first (dev before dev/pts), then fresh pseudo-filesystems.
    assert_eq!(plan[0].kind, MountKind::Bind);
    assert!(plan[0].target.ends_with("dev"));
    assert!(plan[1].target.ends_with("dev/pts"));
    assert_eq!(plan[2].kind, MountKind::Proc);
    assert_eq!(plan[3].kind, MountKind::Sysfs);
}

#[test]
fn test_bootloader_mount_plan_includes_run() {
    let plan = bootloader_mount_plan(Path::new("/mnt/img"));
    assert!(plan.iter().all(|m| m.kind == MountKind::Bind));
    assert!(plan.iter().any(|m| m.target.ends_with("run")));
}

#[test]
fn test_unwind_is_exact_reverse_of_mount_order() {
    let plan = package_mount_plan(Path::new("/work/rootfs"));
    let mounts: Vec<PathBuf> = plan.iter().map(|m| m.target.clone()).collect();

    let attempted = unwind_mounts(&mounts, |_| true, |_| {});

    let expected: Vec<PathBuf> = mounts.iter().rev().cloned().collect();
    assert_eq!(attempted, expected);
}

#[test]
fn test_unwind_tolerates_already_unmounted_paths() {
    let mounts = vec![PathBuf::from("/t/a"), PathBuf::from("/t/b")];
    let attempted = unwind_mounts(&mounts, |p| p.ends_with("a"), |_| {});
    assert_eq!(attempted, vec![PathBuf::from("/t/a")]);
}

// =============================================================================
// Desktop resolution
// =============================================================================

#[test]
fn test_desktop_resolution_picks_first_available() {
    // Canonical case: [A, B, C] with only B and C available resolves to B.
    let selection = resolve_desktop(&["a", "b", "c"], |name| name != "a");
    assert_eq!(selection.resolved.as_deref(), Some("b"));
}

#[test]
fn test_desktop_resolution_none_available_skips() {
    let selection = resolve_desktop(Desktop::Xfce.candidates(), |_| false);
    assert!(selection.resolved.is_none());
}

#[test]
fn test_desktop_candidates_cover_both_families() {
    // Each flavor mixes Debian tasks and Ubuntu metapackages so probing,
    // not the family, decides what installs.
    let candidates = Desktop::Xfce.candidates();
    assert!(candidates.iter().any(|c| c.starts_with("task-")));
    assert!(candidates.iter().any(|c| c.ends_with("ubuntu-desktop") || c.contains("ubuntu")));
}

// =============================================================================
// Partition layout
// =============================================================================

#[test]
fn test_gpt_layout_command_stream() {
    let script = parted_args(Path::new("/dev/loop7")).join(" ");

    assert!(script.contains("mklabel gpt"));
    assert!(script.contains("mkpart ESP fat32 1MiB 513MiB"));
    assert!(script.contains("set 1 esp on"));
    assert!(script.contains("mkpart rootfs ext4 513MiB 100%"));
}

// =============================================================================
// Copy exclusion and fstab
// =============================================================================

#[test]
fn test_copy_exclusion_covers_virtual_subtrees() {
    for subtree in ["dev", "proc", "sys", "tmp", "run", "mnt", "media", "lost+found"] {
        assert!(
            EXCLUDED_SUBTREES.contains(&subtree),
            "{} missing from exclusions",
            subtree
        );
    }

    let args = rsync_args(Path::new("/src/rootfs"), Path::new("/dst"));
    for subtree in EXCLUDED_SUBTREES {
        assert!(args.contains(&format!("--exclude=/{}", subtree)));
    }
}

#[test]
fn test_fstab_has_fixed_options_per_partition() {
    let fstab = render_fstab("root-uuid-1", "EFI-UUID-2");

    assert!(fstab.contains("UUID=root-uuid-1"));
    assert!(fstab.contains("UUID=EFI-UUID-2"));
    assert!(fstab.contains("errors=remount-ro"));
    assert!(fstab.contains("umask=0077"));
    // Root mounts at /, the ESP under /boot/efi.
    assert!(fstab.contains("\t/\t"));
    assert!(fstab.contains("\t/boot/efi\t"));
}

// =============================================================================
// Image size
// =============================================================================

#[test]
fn test_image_size_units() {
    assert_eq!("4G".parse::<ImageSize>().unwrap().bytes(), 4 * 1024 * 1024 * 1024);
    assert_eq!("512M".parse::<ImageSize>().unwrap().bytes(), 512 * 1024 * 1024);
    assert!("".parse::<ImageSize>().is_err());
    assert!("eight".parse::<ImageSize>().is_err());
}
