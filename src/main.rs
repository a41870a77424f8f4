//! debforge - interactive Debian/Ubuntu disk image builder.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use debforge::commands;
use debforge::commands::build::BuildOptions;
use debforge::config::Config;

#[derive(Parser)]
#[command(name = "debforge")]
#[command(about = "Interactive Debian/Ubuntu disk image builder")]
#[command(
    after_help = "QUICK START:\n  sudo debforge preflight  Check host dependencies\n  sudo debforge build      Build a bootable disk image\n  sudo debforge clean      Remove build artifacts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a bootable disk image (interactive by default)
    Build {
        /// Directory to bootstrap the root filesystem into
        #[arg(long)]
        target_dir: Option<PathBuf>,
        /// Output disk image path
        #[arg(long)]
        image: Option<PathBuf>,
        /// Disk image size (e.g. 8G, 4096M)
        #[arg(long)]
        size: Option<String>,
        /// Distribution family (debian, ubuntu)
        #[arg(long)]
        family: Option<String>,
        /// Suite name (e.g. bookworm, noble)
        #[arg(long)]
        suite: Option<String>,
        /// Mirror URL override
        #[arg(long)]
        mirror: Option<String>,
        /// Target architecture (default: amd64)
        #[arg(long)]
        arch: Option<String>,
        /// Desktop environment (xfce, gnome, kde, lxqt, mate, none)
        #[arg(long)]
        desktop: Option<String>,
        /// Accept a suite name outside the known allow-list
        #[arg(long)]
        allow_any_suite: bool,
        /// Stop after the chroot package phase; skip the disk image
        #[arg(long)]
        skip_image: bool,
        /// Never prompt; unset selections fall back to defaults
        #[arg(long)]
        non_interactive: bool,
    },

    /// Run preflight checks (verify host dependencies before build)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
        /// Install the host dependency packages via apt first
        #[arg(long)]
        install_deps: bool,
    },

    /// Remove build artifacts (root filesystem, image, report)
    Clean,

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();
    let config = Config::load();

    debforge::cleanup::install_signal_handler();

    match cli.command {
        Commands::Build {
            target_dir,
            image,
            size,
            family,
            suite,
            mirror,
            arch,
            desktop,
            allow_any_suite,
            skip_image,
            non_interactive,
        } => {
            let opts = BuildOptions {
                target_dir,
                image,
                size,
                family,
                suite,
                mirror,
                arch,
                desktop,
                allow_any_suite,
                skip_image,
                non_interactive,
            };
            commands::cmd_build(&config, opts)?;
        }

        Commands::Preflight {
            strict,
            install_deps,
        } => {
            commands::cmd_preflight(strict, install_deps)?;
        }

        Commands::Clean => {
            commands::cmd_clean(&config)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
