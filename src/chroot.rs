//! Chroot session management.
//!
//! A `ChrootSession` owns the bind-mounted pseudo-filesystems a package
//! manager needs inside a target tree, plus the resolver configuration.
//! Mounts are recorded in mount order and released strictly LIFO. `begin`
//! is NOT idempotent: calling it twice on the same root without an
//! intervening `end` produces duplicate mounts — hold at most one live
//! session per root.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use crate::cleanup;
use crate::process::{Cmd, StepPolicy};

/// How a single mount point is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// Bind mount of a host directory.
    Bind,
    /// Fresh proc filesystem.
    Proc,
    /// Fresh sysfs filesystem.
    Sysfs,
}

/// One step of a mount plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    /// Host source for bind mounts; None for fresh pseudo-filesystems.
    pub source: Option<PathBuf>,
    /// Absolute target path under the session root.
    pub target: PathBuf,
    pub kind: MountKind,
}

impl MountPoint {
    fn bind(source: &str, target: PathBuf) -> Self {
        Self {
            source: Some(PathBuf::from(source)),
            target,
            kind: MountKind::Bind,
        }
    }
}

/// Mount plan for package operations inside a bootstrapped tree.
///
/// Order matters: /dev must be bound before /dev/pts.
pub fn package_mount_plan(root: &Path) -> Vec<MountPoint> {
    vec![
        MountPoint::bind("/dev", root.join("dev")),
        MountPoint::bind("/dev/pts", root.join("dev/pts")),
        MountPoint {
            source: None,
            target: root.join("proc"),
            kind: MountKind::Proc,
        },
        MountPoint {
            source: None,
            target: root.join("sys"),
            kind: MountKind::Sysfs,
        },
    ]
}

/// Mount plan for the bootloader install inside a mounted image root.
///
/// Everything is bound from the host so grub sees real devices.
pub fn bootloader_mount_plan(root: &Path) -> Vec<MountPoint> {
    vec![
        MountPoint::bind("/dev", root.join("dev")),
        MountPoint::bind("/dev/pts", root.join("dev/pts")),
        MountPoint::bind("/proc", root.join("proc")),
        MountPoint::bind("/sys", root.join("sys")),
        MountPoint::bind("/run", root.join("run")),
    ]
}

/// Build the mount invocation for one plan step. A bind step without a
/// source is a malformed plan and errors rather than mounting anything.
fn mount_command(step: &MountPoint) -> Result<Cmd> {
    let cmd = Cmd::new("mount");
    let cmd = match step.kind {
        MountKind::Bind => {
            let source = step
                .source
                .as_deref()
                .with_context(|| format!("Bind mount {} has no source", step.target.display()))?;
            cmd.arg("--bind").arg_path(source)
        }
        MountKind::Proc => cmd.args(["-t", "proc", "proc"]),
        MountKind::Sysfs => cmd.args(["-t", "sysfs", "sys"]),
    };
    Ok(cmd
        .arg_path(&step.target)
        .error_msg(format!("Failed to mount {}", step.target.display())))
}

/// A live chroot session over a target tree.
pub struct ChrootSession {
    root: PathBuf,
    mounted: Vec<MountPoint>,
}

impl ChrootSession {
    /// Begin a session for package operations: bind /dev, bind /dev/pts,
    /// mount fresh proc and sysfs, copy the host resolver configuration.
    pub fn begin(root: &Path) -> Result<Self> {
        Self::begin_with_plan(root, package_mount_plan(root))
    }

    /// Begin an independent session over a mounted image root for the
    /// bootloader install.
    pub fn begin_for_bootloader(root: &Path) -> Result<Self> {
        Self::begin_with_plan(root, bootloader_mount_plan(root))
    }

    fn begin_with_plan(root: &Path, plan: Vec<MountPoint>) -> Result<Self> {
        let mut session = Self {
            root: root.to_path_buf(),
            mounted: Vec::new(),
        };

        for step in plan {
            session.mount(step)?;
        }
        session.copy_resolv_conf()?;

        Ok(session)
    }

    fn mount(&mut self, step: MountPoint) -> Result<()> {
        fs::create_dir_all(&step.target)
            .with_context(|| format!("Failed to create mount point {}", step.target.display()))?;

        mount_command(&step)?.run()?;

        cleanup::register_mount(&step.target);
        self.mounted.push(step);
        Ok(())
    }

    /// Copy the host's resolv.conf so networking works inside the chroot.
    fn copy_resolv_conf(&self) -> Result<()> {
        let etc = self.root.join("etc");
        fs::create_dir_all(&etc)?;
        // resolv.conf is often a symlink on the host; read through it.
        let content = fs::read("/etc/resolv.conf").context("Failed to read host resolv.conf")?;
        fs::write(etc.join("resolv.conf"), content)
            .context("Failed to write resolv.conf into target")?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of currently mounted paths (empty after a full `end`).
    pub fn mounted_count(&self) -> usize {
        self.mounted.len()
    }

    /// Run a command inside the chroot with a curated environment subset.
    ///
    /// Returns the exit status; the caller decides whether non-zero is
    /// fatal.
    pub fn run(&self, command: &str) -> Result<ExitStatus> {
        self.base_cmd(command).allow_fail().run_streaming()
    }

    /// Run a command inside the chroot as a policy-governed build step.
    pub fn run_step(&self, command: &str, label: &str, policy: StepPolicy) -> Result<Option<String>> {
        self.base_cmd(command).error_msg(label).run_step(policy)
    }

    /// Run a GUI command inside the chroot, forwarding the host display.
    pub fn run_gui(&self, command: &str) -> Result<ExitStatus> {
        let mut cmd = self.base_cmd(command);
        if let Ok(display) = std::env::var("DISPLAY") {
            cmd = cmd.env("DISPLAY", display);
        }
        if let Ok(xauth) = std::env::var("XAUTHORITY") {
            cmd = cmd.env("XAUTHORITY", xauth);
        }
        cmd.allow_fail().run_streaming()
    }

    fn base_cmd(&self, command: &str) -> Cmd {
        Cmd::new("chroot")
            .arg_path(&self.root)
            .args(["sh", "-c", command])
            .env("PATH", "/usr/sbin:/usr/bin:/sbin:/bin")
            .env("HOME", "/root")
            .env("TERM", std::env::var("TERM").unwrap_or_else(|_| "linux".into()))
            .env("DEBIAN_FRONTEND", "noninteractive")
    }

    /// Unmount everything this session mounted, in strict reverse order.
    ///
    /// Each unmount is lazy/forced and independently best-effort: an
    /// already-unmounted path is an informational note, not a failure.
    pub fn end(&mut self) {
        while let Some(step) = self.mounted.pop() {
            cleanup::unmount_best_effort(&step.target);
            cleanup::deregister_mount(&step.target);
        }
    }
}

impl Drop for ChrootSession {
    fn drop(&mut self) {
        if !self.mounted.is_empty() {
            println!("  Releasing chroot mounts for {}", self.root.display());
            self.end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_plan_order() {
        let root = Path::new("/work/rootfs");
        let plan = package_mount_plan(root);

        let targets: Vec<_> = plan.iter().map(|m| m.target.clone()).collect();
        assert_eq!(
            targets,
            vec![
                PathBuf::from("/work/rootfs/dev"),
                PathBuf::from("/work/rootfs/dev/pts"),
                PathBuf::from("/work/rootfs/proc"),
                PathBuf::from("/work/rootfs/sys"),
            ]
        );
        // /dev/pts depends on /dev already being bound.
        assert!(targets[0].ends_with("dev"));
        assert!(targets[1].ends_with("dev/pts"));
    }

    #[test]
    fn test_package_plan_kinds() {
        let plan = package_mount_plan(Path::new("/r"));
        assert_eq!(plan[0].kind, MountKind::Bind);
        assert_eq!(plan[1].kind, MountKind::Bind);
        assert_eq!(plan[2].kind, MountKind::Proc);
        assert_eq!(plan[3].kind, MountKind::Sysfs);
        assert_eq!(plan[2].source, None);
    }

    #[test]
    fn test_bootloader_plan_is_all_binds_and_includes_run() {
        let plan = bootloader_mount_plan(Path::new("/mnt/img"));
        assert_eq!(plan.len(), 5);
        assert!(plan.iter().all(|m| m.kind == MountKind::Bind));
        assert!(plan.iter().any(|m| m.target.ends_with("run")));
    }

    #[test]
    fn test_bind_step_without_source_is_an_error() {
        let step = MountPoint {
            source: None,
            target: PathBuf::from("/r/dev"),
            kind: MountKind::Bind,
        };

        let err = mount_command(&step).unwrap_err();
        assert!(err.to_string().contains("no source"));
    }

    #[test]
    fn test_pseudo_fs_steps_need_no_source() {
        for step in package_mount_plan(Path::new("/r")) {
            if step.kind != MountKind::Bind {
                assert!(mount_command(&step).is_ok());
            }
        }
    }

    #[test]
    fn test_unmount_order_is_reverse_of_mount_order() {
        // Model the session bookkeeping without touching the system: push
        // the plan, then pop as `end` does.
        let plan = package_mount_plan(Path::new("/r"));
        let mut mounted = plan.clone();
        let mut unmounted = Vec::new();
        while let Some(step) = mounted.pop() {
            unmounted.push(step.target);
        }

        let expected: Vec<_> = plan.iter().rev().map(|m| m.target.clone()).collect();
        assert_eq!(unmounted, expected);
        assert!(mounted.is_empty());
    }
}
