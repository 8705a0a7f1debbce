#![warn(missing_docs)]
//! twinfs mount daemon.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use twinfs_core::MemFsConfig;
use twinfs_fuse::filesystem::TwinFs;
use twinfs_fuse::mount;

/// In-memory filesystem with mirrored channel files.
#[derive(Parser)]
#[command(name = "twinfs", version, about = "In-memory filesystem with mirrored channel files", long_about = None)]
struct Cli {
    /// Directory to mount the filesystem on.
    mountpoint: PathBuf,

    /// Comma-separated mount options (allow_other, allow_root,
    /// default_permissions, auto_unmount, ro).
    #[arg(short, long, default_value = "")]
    options: String,

    /// Keep an operation journal in a /log file inside the mount.
    #[arg(long)]
    oplog: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let opts = mount::parse_mount_options(&cli.options)?;

    tracing::info!("twinfs starting at {}", cli.mountpoint.display());
    let fs = TwinFs::new(MemFsConfig { oplog: cli.oplog });
    mount::mount(fs, &cli.mountpoint, &opts)?;

    tracing::info!("twinfs unmounted");
    Ok(())
}
