//! Disk image materialization.
//!
//! Linear pipeline over the finished chroot tree:
//! create the raw file, partition, format, mount, populate, install the
//! bootloader, unmount, finalize. No step retries; on error the guards
//! unwind whatever was set up and the error surfaces with its step
//! context.

pub mod bootloader;
pub mod loopdev;
pub mod partition;
pub mod populate;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cleanup;
use crate::process::Cmd;
use loopdev::LoopDevice;

/// Image size parsed from operator strings ("4G", "512M", "8192").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize(pub u64);

impl ImageSize {
    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl FromStr for ImageSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            bail!("Image size must not be empty");
        }

        let (num_str, multiplier) = if let Some(n) = s.strip_suffix(['G', 'g']) {
            (n, 1024 * 1024 * 1024u64)
        } else if let Some(n) = s.strip_suffix(['M', 'm']) {
            (n, 1024 * 1024u64)
        } else if let Some(n) = s.strip_suffix(['K', 'k']) {
            (n, 1024u64)
        } else {
            (s, 1u64)
        };

        let num: u64 = num_str
            .trim()
            .parse()
            .with_context(|| format!("Invalid image size: {}", s))?;

        if num == 0 {
            bail!("Image size must be non-zero");
        }
        let bytes = num
            .checked_mul(multiplier)
            .with_context(|| format!("Image size too large: {}", s))?;
        Ok(Self(bytes))
    }
}

/// Machine-readable summary written next to the finished image.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub image_path: PathBuf,
    pub size_bytes: u64,
    pub root_uuid: String,
    pub efi_uuid: String,
    pub warnings: Vec<String>,
}

/// Result of a successful materialization.
pub struct MaterializeOutcome {
    pub image_path: PathBuf,
    /// Best-effort failures collected along the way (bootloader etc.).
    pub warnings: Vec<String>,
}

/// Mounted image partitions, unwound in reverse mount order on Drop.
struct ImageMounts {
    mounts: Vec<PathBuf>,
}

impl ImageMounts {
    fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    fn mount(&mut self, device: &Path, target: &Path) -> Result<()> {
        fs::create_dir_all(target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        Cmd::new("mount")
            .arg_path(device)
            .arg_path(target)
            .error_msg(format!("Failed to mount {}", target.display()))
            .run()?;
        cleanup::register_mount(target);
        self.mounts.push(target.to_path_buf());
        Ok(())
    }

    fn unmount_all(&mut self) {
        while let Some(target) = self.mounts.pop() {
            cleanup::unmount_best_effort(&target);
            cleanup::deregister_mount(&target);
        }
    }
}

impl Drop for ImageMounts {
    fn drop(&mut self) {
        if !self.mounts.is_empty() {
            println!("  Releasing image mounts");
            self.unmount_all();
        }
    }
}

/// Allocate the raw backing file. Overwrites any existing file at the
/// path (destructive, documented).
fn create_backing_file(path: &Path, size: ImageSize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create image file {}", path.display()))?;
    file.set_len(size.bytes())
        .context("Failed to size image file")?;
    Ok(())
}

/// Materialize the bootable disk image from the chroot tree.
pub fn materialize(
    chroot_dir: &Path,
    image_path: &Path,
    size: ImageSize,
) -> Result<MaterializeOutcome> {
    let mut warnings = Vec::new();

    // Created
    println!("\n=== Creating disk image ===");
    println!("  Path: {}", image_path.display());
    println!("  Size: {} bytes", size.bytes());
    create_backing_file(image_path, size).context("creating image file")?;

    // Partitioned
    println!("\n=== Partitioning ===");
    let mut loop_dev = LoopDevice::attach(image_path).context("associating loop device")?;
    partition::write_gpt(loop_dev.node()).context("partitioning disk image")?;
    loop_dev.rescan()?;

    let esp_dev = loop_dev.partition(1).context("resolving EFI partition node")?;
    let root_dev = loop_dev.partition(2).context("resolving root partition node")?;

    // Formatted
    println!("\n=== Formatting ===");
    partition::format_esp(&esp_dev).context("formatting EFI partition")?;
    partition::format_root(&root_dev).context("formatting root partition")?;

    let efi_uuid = partition::filesystem_uuid(&esp_dev)?;
    let root_uuid = partition::filesystem_uuid(&root_dev)?;
    println!("  EFI UUID:  {}", efi_uuid);
    println!("  Root UUID: {}", root_uuid);

    // Mounted
    println!("\n=== Mounting image ===");
    let mount_root = mount_dir_for(image_path);
    if mount_root.exists() {
        fs::remove_dir_all(&mount_root)?;
    }
    let mut mounts = ImageMounts::new();
    mounts.mount(&root_dev, &mount_root).context("mounting root partition")?;
    mounts
        .mount(&esp_dev, &mount_root.join("boot/efi"))
        .context("mounting EFI partition")?;

    // Populated
    println!("\n=== Populating ===");
    populate::copy_rootfs(chroot_dir, &mount_root).context("populating image root")?;
    populate::write_fstab(&mount_root, &root_uuid, &efi_uuid).context("writing fstab")?;

    // BootloaderInstalled (best-effort by design)
    println!("\n=== Bootloader ===");
    match bootloader::install_bootloader(&mount_root) {
        Ok(mut w) => warnings.append(&mut w),
        Err(e) => {
            let warning = format!("bootloader session failed: {:#}", e);
            eprintln!("  [WARN] {}", warning);
            warnings.push(warning);
        }
    }

    // Unmounted
    println!("\n=== Unmounting ===");
    mounts.unmount_all();
    loop_dev.detach().context("releasing loop device")?;
    fs::remove_dir_all(&mount_root).ok();

    // Finalized
    let report = BuildReport {
        image_path: image_path.to_path_buf(),
        size_bytes: size.bytes(),
        root_uuid,
        efi_uuid,
        warnings: warnings.clone(),
    };
    write_report(&report)?;

    println!("\n=== Image ready ===");
    println!("  {}", image_path.display());
    println!(
        "  Write it with: dd if={} of=/dev/sdX bs=4M status=progress conv=fsync",
        image_path.display()
    );

    Ok(MaterializeOutcome {
        image_path: image_path.to_path_buf(),
        warnings,
    })
}

/// Temporary mount directory derived from the image path.
fn mount_dir_for(image_path: &Path) -> PathBuf {
    let mut name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".into());
    name.push_str(".mnt");
    image_path.with_file_name(name)
}

fn write_report(report: &BuildReport) -> Result<()> {
    let mut path = report.image_path.clone();
    path.set_extension("report.json");
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write build report {}", path.display()))?;
    println!("  Report: {}", path.display());
    Ok(())
}
