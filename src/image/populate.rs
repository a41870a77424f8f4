//! Copying the chroot tree into the mounted image and generating fstab.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::process::Cmd;

/// Virtual/runtime subtrees that must remain empty mount points in the
/// image rather than copies of host state.
pub const EXCLUDED_SUBTREES: &[&str] =
    &["dev", "proc", "sys", "tmp", "run", "mnt", "media", "lost+found"];

/// rsync argument list for the tree copy: archive mode preserving
/// hardlinks, ACLs and extended attributes, with every virtual subtree
/// excluded.
pub fn rsync_args(source: &Path, dest: &Path) -> Vec<String> {
    let mut args = vec!["-aHAX".to_string()];
    for subtree in EXCLUDED_SUBTREES {
        args.push(format!("--exclude=/{}", subtree));
    }
    // Trailing slash: copy the tree's contents, not the directory itself.
    args.push(format!("{}/", source.display()));
    args.push(dest.to_string_lossy().into_owned());
    args
}

/// Copy the chroot tree into the mounted root partition.
pub fn copy_rootfs(source: &Path, dest: &Path) -> Result<()> {
    println!("Copying root filesystem (this can take a while)...");
    let args = rsync_args(source, dest);
    Cmd::new("rsync")
        .args(args.iter().map(|s| s.as_str()))
        .error_msg("rsync copy into image failed")
        .run_streaming()?;

    recreate_mount_points(dest)?;
    verify_excluded_empty(dest)?;
    Ok(())
}

/// Recreate the excluded subtrees as empty directories so the image has
/// its mount points.
fn recreate_mount_points(dest: &Path) -> Result<()> {
    for subtree in EXCLUDED_SUBTREES {
        if *subtree == "lost+found" {
            // mkfs.ext4 already made it on the root partition.
            continue;
        }
        let dir = dest.join(subtree);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create mount point {}", dir.display()))?;
    }
    Ok(())
}

/// Verify no regular file was copied under any excluded subtree.
pub fn verify_excluded_empty(dest: &Path) -> Result<()> {
    for subtree in EXCLUDED_SUBTREES {
        let dir = dest.join(subtree);
        if !dir.exists() {
            continue;
        }
        for entry in WalkDir::new(&dir).min_depth(1) {
            let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
            if entry.file_type().is_file() {
                bail!(
                    "Excluded subtree /{} contains a regular file: {}",
                    subtree,
                    entry.path().display()
                );
            }
        }
    }
    Ok(())
}

/// Render `/etc/fstab` mapping both partitions by UUID with the fixed
/// option strings.
pub fn render_fstab(root_uuid: &str, efi_uuid: &str) -> String {
    format!(
        "# /etc/fstab: static file system information.\n\
         UUID={}\t/\text4\terrors=remount-ro\t0\t1\n\
         UUID={}\t/boot/efi\tvfat\tumask=0077\t0\t2\n",
        root_uuid, efi_uuid
    )
}

/// Write the generated fstab into the populated image root.
pub fn write_fstab(dest: &Path, root_uuid: &str, efi_uuid: &str) -> Result<()> {
    let etc = dest.join("etc");
    fs::create_dir_all(&etc)?;
    fs::write(etc.join("fstab"), render_fstab(root_uuid, efi_uuid))
        .context("Failed to write fstab into image")?;
    Ok(())
}
