//! Loop device lifecycle and partition-node resolution.
//!
//! Some kernels expose `p1`/`p2` nodes on the loop device directly once
//! partition scanning is on; others need kpartx to synthesize mapper
//! entries. Both strategies sit behind `PartitionBackend` so teardown
//! always matches whatever setup produced.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::cleanup;
use crate::process::Cmd;

/// Strategy for addressing partitions of an attached loop device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionBackend {
    /// Kernel exposes /dev/loopNpM directly.
    Direct,
    /// kpartx mappings under /dev/mapper.
    Mapper,
}

impl PartitionBackend {
    /// Device node for the given 1-based partition index.
    pub fn partition_node(&self, loop_node: &Path, index: u32) -> PathBuf {
        match self {
            PartitionBackend::Direct => {
                PathBuf::from(format!("{}p{}", loop_node.display(), index))
            }
            PartitionBackend::Mapper => {
                let name = loop_node
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                PathBuf::from(format!("/dev/mapper/{}p{}", name, index))
            }
        }
    }
}

/// An attached loop device over a disk image file.
pub struct LoopDevice {
    node: PathBuf,
    backend: Option<PartitionBackend>,
    detached: bool,
}

impl LoopDevice {
    /// Associate the image file with a free loop device, with partition
    /// scanning enabled. Association failure is fatal.
    pub fn attach(image: &Path) -> Result<Self> {
        let result = Cmd::new("losetup")
            .args(["--find", "--show", "-P"])
            .arg_path(image)
            .error_msg("Failed to associate image with a loop device")
            .run()?;

        let node = PathBuf::from(result.stdout_trimmed());
        if node.as_os_str().is_empty() {
            bail!("losetup reported no device node for {}", image.display());
        }
        println!("  Loop device: {}", node.display());

        cleanup::register_loop(&node, false);
        Ok(Self {
            node,
            backend: None,
            detached: false,
        })
    }

    pub fn node(&self) -> &Path {
        &self.node
    }

    /// Re-read the partition table after it has been written.
    pub fn rescan(&self) -> Result<()> {
        let _ = Cmd::new("partprobe").arg_path(&self.node).allow_fail().run();
        let _ = Cmd::new("udevadm").arg("settle").allow_fail().run();
        Ok(())
    }

    /// Resolve which partition backend this kernel offers.
    ///
    /// Probes for the direct `p1` node; when absent, synthesizes mapper
    /// entries via kpartx. Neither strategy is assumed universally
    /// correct.
    pub fn resolve_backend(&mut self) -> Result<PartitionBackend> {
        if let Some(backend) = self.backend {
            return Ok(backend);
        }

        let direct = PartitionBackend::Direct.partition_node(&self.node, 1);
        if direct.exists() {
            self.backend = Some(PartitionBackend::Direct);
            return Ok(PartitionBackend::Direct);
        }

        println!("  No direct partition nodes, falling back to kpartx...");
        Cmd::new("kpartx")
            .args(["-a", "-v"])
            .arg_path(&self.node)
            .error_msg("kpartx failed to map loop partitions")
            .run()?;
        let _ = Cmd::new("udevadm").arg("settle").allow_fail().run();

        cleanup::deregister_loop(&self.node);
        cleanup::register_loop(&self.node, true);

        let mapped = PartitionBackend::Mapper.partition_node(&self.node, 1);
        if !mapped.exists() {
            bail!(
                "Partition node unavailable via both direct ({}) and mapper ({}) strategies",
                direct.display(),
                mapped.display()
            );
        }

        self.backend = Some(PartitionBackend::Mapper);
        Ok(PartitionBackend::Mapper)
    }

    /// Device node for the given 1-based partition index.
    pub fn partition(&mut self, index: u32) -> Result<PathBuf> {
        let backend = self.resolve_backend()?;
        Ok(backend.partition_node(&self.node, index))
    }

    /// Release the loop device and any mapper fallback entries.
    ///
    /// Must run only after all partitions are unmounted.
    pub fn detach(&mut self) -> Result<()> {
        if self.detached {
            return Ok(());
        }

        if self.backend == Some(PartitionBackend::Mapper) {
            let _ = Cmd::new("kpartx").arg("-d").arg_path(&self.node).allow_fail().run();
        }
        Cmd::new("losetup")
            .arg("-d")
            .arg_path(&self.node)
            .error_msg("Failed to release loop device")
            .run()
            .with_context(|| format!("releasing {}", self.node.display()))?;

        cleanup::deregister_loop(&self.node);
        self.detached = true;
        Ok(())
    }
}

impl Drop for LoopDevice {
    fn drop(&mut self) {
        if !self.detached {
            println!("  Releasing loop device {}", self.node.display());
            if self.backend == Some(PartitionBackend::Mapper) {
                let _ = Cmd::new("kpartx").arg("-d").arg_path(&self.node).allow_fail().run();
            }
            let _ = Cmd::new("losetup").arg("-d").arg_path(&self.node).allow_fail().run();
            cleanup::deregister_loop(&self.node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_partition_node_naming() {
        let node = PartitionBackend::Direct.partition_node(Path::new("/dev/loop3"), 2);
        assert_eq!(node, PathBuf::from("/dev/loop3p2"));
    }

    #[test]
    fn test_mapper_partition_node_naming() {
        let node = PartitionBackend::Mapper.partition_node(Path::new("/dev/loop3"), 1);
        assert_eq!(node, PathBuf::from("/dev/mapper/loop3p1"));
    }
}
