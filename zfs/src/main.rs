//! ZFS Calculation Command-Line Interface
//!
//! This is the main entry point for running ZFS calculations with YAML configuration.

use color_eyre::eyre::Result;
use zfs::app::ZfsApplication;

fn main() -> Result<()> {
    color_eyre::install()?;
    ZfsApplication::from_cli()?.run()
}
