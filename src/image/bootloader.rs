//! Bootloader installation into the mounted image.
//!
//! Runs a second, independent chroot session over the image mount and
//! drives grub. Every step here is best-effort: bootloader install
//! portability across host/target combinations is inherently unreliable,
//! so failures become warnings and the image is still produced.

use anyhow::Result;
use std::path::Path;

use crate::chroot::ChrootSession;
use crate::process::StepPolicy;

/// Packages that provide the EFI bootloader inside the image.
const GRUB_PACKAGES: &[&str] = &["grub-efi-amd64", "shim-signed"];

/// Install grub into the image via a chroot over its mounted root.
///
/// `--removable` places the loader at the fallback EFI path so firmware
/// finds it without an NVRAM entry tied to a specific disk.
pub fn install_bootloader(image_root: &Path) -> Result<Vec<String>> {
    println!("Installing bootloader (best-effort)...");
    let mut warnings = Vec::new();

    let mut session = ChrootSession::begin_for_bootloader(image_root)?;

    let steps = [
        (
            format!("apt-get install -y {}", GRUB_PACKAGES.join(" ")),
            "bootloader package install",
        ),
        (
            "grub-install --target=x86_64-efi --efi-directory=/boot/efi \
             --boot-directory=/boot --removable --no-nvram"
                .to_string(),
            "grub-install",
        ),
        ("update-grub".to_string(), "grub menu regeneration"),
    ];

    for (command, label) in &steps {
        match session.run_step(command, label, StepPolicy::BestEffort) {
            Ok(Some(warning)) => warnings.push(warning),
            Ok(None) => {}
            Err(e) => {
                // Even a launch failure is non-fatal here.
                let warning = format!("{}: {}", label, e);
                eprintln!("  [WARN] {}", warning);
                warnings.push(warning);
            }
        }
    }

    session.end();
    Ok(warnings)
}
