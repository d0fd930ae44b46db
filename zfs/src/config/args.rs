//! Command-line argument parsing for ZFS calculations

use crate::zfs_impl::Backend;
use clap::Parser;
use wfc::{FftGridChoice, MemoryMode};

/// Zero-field-splitting tensor calculation with YAML configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override number of processes (must be a perfect square)
    #[arg(short, long)]
    pub nprocs: Option<usize>,

    /// Override memory mode (high, low or critical)
    #[arg(long)]
    pub memory: Option<MemoryMode>,

    /// Override pair contraction backend (auto, serial or threaded)
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Override FFT grid (density, wave or n1,n2,n3)
    #[arg(long)]
    pub fftgrid: Option<FftGridChoice>,

    /// Override directory for Iijab.npy and zfs.yml
    #[arg(short, long)]
    pub path: Option<String>,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compare D and E with a reference zfs.yml
    #[arg(long)]
    pub compare: Option<String>,

    /// Tolerance in MHz for --compare
    #[arg(long)]
    pub compare_tolerance: Option<f64>,

    /// Abort when a pair contraction has a significant imaginary part
    #[arg(long)]
    pub fail_on_imaginary: bool,
}
