//! GPT partitioning and filesystem formatting for the disk image.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::process::Cmd;

/// ESP offset from the start of the disk.
pub const ESP_START: &str = "1MiB";
/// ESP end: 1 MiB offset + 512 MiB partition.
pub const ESP_END: &str = "513MiB";
/// Volume label for the EFI system partition.
pub const ESP_LABEL: &str = "EFI";
/// Volume label for the root partition.
pub const ROOT_LABEL: &str = "rootfs";

/// The parted script for the fixed two-partition GPT layout:
/// partition 1 = ESP, FAT32, 1 MiB..513 MiB, esp flag set;
/// partition 2 = ext4, remaining capacity.
pub fn parted_args(device: &Path) -> Vec<String> {
    vec![
        "--script".into(),
        device.to_string_lossy().into_owned(),
        "mklabel".into(),
        "gpt".into(),
        "mkpart".into(),
        "ESP".into(),
        "fat32".into(),
        ESP_START.into(),
        ESP_END.into(),
        "set".into(),
        "1".into(),
        "esp".into(),
        "on".into(),
        "mkpart".into(),
        "rootfs".into(),
        "ext4".into(),
        ESP_END.into(),
        "100%".into(),
    ]
}

/// Write the GPT label and both partitions onto the loop device.
pub fn write_gpt(device: &Path) -> Result<()> {
    let args = parted_args(device);
    Cmd::new("parted")
        .args(args.iter().map(|s| s.as_str()))
        .error_msg("parted failed to write GPT layout")
        .run()?;
    Ok(())
}

/// Format the EFI system partition as FAT32. Forces over any prior
/// filesystem signature.
pub fn format_esp(device: &Path) -> Result<()> {
    Cmd::new("mkfs.vfat")
        .args(["-F", "32", "-n", ESP_LABEL])
        .arg_path(device)
        .error_msg("mkfs.vfat failed")
        .run()?;
    Ok(())
}

/// Format the root partition as ext4. `-F` forces over any prior
/// filesystem signature.
pub fn format_root(device: &Path) -> Result<()> {
    Cmd::new("mkfs.ext4")
        .args(["-F", "-q", "-L", ROOT_LABEL])
        .arg_path(device)
        .error_msg("mkfs.ext4 failed")
        .run()?;
    Ok(())
}

/// Query a formatted partition's filesystem UUID.
pub fn filesystem_uuid(device: &Path) -> Result<String> {
    let result = Cmd::new("blkid")
        .args(["-s", "UUID", "-o", "value"])
        .arg_path(device)
        .error_msg("blkid failed")
        .run()
        .with_context(|| format!("querying UUID of {}", device.display()))?;

    let uuid = result.stdout_trimmed().to_string();
    if uuid.is_empty() {
        bail!("blkid returned no UUID for {}", device.display());
    }
    Ok(uuid)
}
