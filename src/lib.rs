//! debforge - interactive Debian/Ubuntu disk image builder.
//!
//! Bootstraps a minimal root filesystem with debootstrap, installs a
//! desktop environment and packages through a chroot, then packages the
//! result into a bootable GPT/UEFI raw disk image.

pub mod bootstrap;
pub mod chroot;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod image;
pub mod packages;
pub mod preflight;
pub mod process;
pub mod prompt;
pub mod target;
