//! Emergency cleanup registry.
//!
//! Mounts and loop devices are owned by the values that created them
//! (`ChrootSession`, `DiskImage`) and released on their normal exit paths.
//! This registry is the backstop for external interruption: it records
//! every live mount target and loop device by path (non-owning), and the
//! signal hook unwinds whatever is still registered, in reverse order,
//! before the process exits.
//!
//! Every operation here is best-effort and idempotent: unmounting an
//! already-unmounted path is an informational note, never an error, and
//! unwinding an empty registry is a no-op.

use crate::process::Cmd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Default)]
struct Registry {
    /// Mount targets in mount order; unwound in reverse.
    mounts: Vec<PathBuf>,
    /// Attached loop devices, with whether kpartx mappings were created.
    loops: Vec<(PathBuf, bool)>,
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry::default()))
}

/// Record a mount target. Called after the mount succeeds.
pub fn register_mount(target: &Path) {
    if let Ok(mut reg) = registry().lock() {
        reg.mounts.push(target.to_path_buf());
    }
}

/// Forget a mount target. Called after the owner unmounts it.
pub fn deregister_mount(target: &Path) {
    if let Ok(mut reg) = registry().lock() {
        if let Some(pos) = reg.mounts.iter().rposition(|p| p == target) {
            reg.mounts.remove(pos);
        }
    }
}

/// Record an attached loop device.
pub fn register_loop(node: &Path, uses_mapper: bool) {
    if let Ok(mut reg) = registry().lock() {
        reg.loops.push((node.to_path_buf(), uses_mapper));
    }
}

/// Forget a loop device after its owner detached it.
pub fn deregister_loop(node: &Path) {
    if let Ok(mut reg) = registry().lock() {
        reg.loops.retain(|(p, _)| p != node);
    }
}

/// Check whether a path is currently a mount point.
pub fn is_mount_point(path: &Path) -> bool {
    Cmd::new("mountpoint")
        .arg("-q")
        .arg_path(path)
        .allow_fail()
        .run()
        .map(|r| r.success())
        .unwrap_or(false)
}

/// Lazily/forcibly unmount a path. Best-effort; failure is a note only.
pub fn unmount_best_effort(target: &Path) {
    let result = Cmd::new("umount")
        .args(["-l", "-f"])
        .arg_path(target)
        .allow_fail()
        .run();
    match result {
        Ok(r) if r.success() => {}
        _ => println!("  note: {} was not unmounted (possibly not mounted)", target.display()),
    }
}

/// Core unwind over a snapshot of registered paths, with injectable mount
/// probing and unmounting so the ordering logic stays testable.
///
/// Returns the paths it attempted to unmount, in unwind order.
pub fn unwind_mounts(
    mounts: &[PathBuf],
    mut still_mounted: impl FnMut(&Path) -> bool,
    mut unmount: impl FnMut(&Path),
) -> Vec<PathBuf> {
    let mut attempted = Vec::new();
    for target in mounts.iter().rev() {
        if still_mounted(target) {
            unmount(target);
            attempted.push(target.clone());
        }
    }
    attempted
}

/// Unwind everything still registered: mounts in reverse order, then loop
/// devices. Safe to call multiple times and with nothing registered.
pub fn emergency_unwind() {
    let (mounts, loops) = {
        let mut reg = match registry().lock() {
            Ok(reg) => reg,
            Err(poisoned) => poisoned.into_inner(),
        };
        (std::mem::take(&mut reg.mounts), std::mem::take(&mut reg.loops))
    };

    if mounts.is_empty() && loops.is_empty() {
        return;
    }

    println!("\nUnwinding {} mount(s), {} loop device(s)...", mounts.len(), loops.len());

    unwind_mounts(&mounts, is_mount_point, unmount_best_effort);

    for (node, uses_mapper) in loops.iter().rev() {
        if *uses_mapper {
            let _ = Cmd::new("kpartx").arg("-d").arg_path(node).allow_fail().run();
        }
        let _ = Cmd::new("losetup").arg("-d").arg_path(node).allow_fail().run();
    }
}

/// Install the interrupt hook once. On SIGINT/SIGTERM the registry is
/// unwound and the process exits with 130.
pub fn install_signal_handler() {
    static INSTALLED: AtomicBool = AtomicBool::new(false);
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }

    let result = ctrlc::set_handler(|| {
        eprintln!("\nInterrupted - cleaning up...");
        emergency_unwind();
        std::process::exit(130);
    });
    if let Err(e) = result {
        eprintln!("[WARN] Could not install signal handler: {}", e);
    }
}
