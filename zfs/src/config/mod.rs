//! Configuration management for ZFS calculations
//!
//! This module handles configuration structures, defaults, and validation
//! for the system description and the run parameters.

mod args;

pub use args::Args;

use crate::zfs_impl::{Backend, ZfsOptions};
use serde::{Deserialize, Serialize};
use wfc::{FftGridChoice, MemoryMode, ModelOrbital};

/// Main configuration structure for ZFS calculations
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub system: SystemConfig,
    #[serde(default)]
    pub zfs_params: ZfsParams,
    #[serde(default)]
    pub output: OutputParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Bohr,
    Angstrom,
}

/// Periodic system made of analytic model orbitals
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemConfig {
    /// Lattice vectors as rows
    pub lattice: [[f64; 3]; 3],
    /// Unit of the lattice, orbital centres and widths
    #[serde(default)]
    pub units: LengthUnit,
    /// FFT grid of the charge density
    pub density_grid: [usize; 3],
    /// Plane-wave cutoff in Hartree
    pub ecut: f64,
    pub orbitals: Vec<ModelOrbital>,
}

/// ZFS run parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZfsParams {
    pub nprocs: Option<usize>,
    pub memory: Option<MemoryMode>,
    pub backend: Option<Backend>,
    pub fftgrid: Option<FftGridChoice>,
    pub imag_tolerance: Option<f64>,
    pub fail_on_imaginary: Option<bool>,
    pub progress_step: Option<usize>,
}

impl Default for ZfsParams {
    fn default() -> Self {
        let options = ZfsOptions::default();
        ZfsParams {
            nprocs: Some(1),
            memory: Some(options.memory),
            backend: Some(options.backend),
            fftgrid: Some(FftGridChoice::Density),
            imag_tolerance: Some(options.imag_tolerance),
            fail_on_imaginary: Some(options.fail_on_imaginary),
            progress_step: Some(options.progress_step),
        }
    }
}

impl ZfsParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.nprocs.is_none() {
            self.nprocs = defaults.nprocs;
        }
        if self.memory.is_none() {
            self.memory = defaults.memory;
        }
        if self.backend.is_none() {
            self.backend = defaults.backend;
        }
        if self.fftgrid.is_none() {
            self.fftgrid = defaults.fftgrid;
        }
        if self.imag_tolerance.is_none() {
            self.imag_tolerance = defaults.imag_tolerance;
        }
        if self.fail_on_imaginary.is_none() {
            self.fail_on_imaginary = defaults.fail_on_imaginary;
        }
        if self.progress_step.is_none() {
            self.progress_step = defaults.progress_step;
        }
        self
    }
}

/// Where and what to write
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputParams {
    pub path: Option<String>,
    pub write_npy: Option<bool>,
    pub compare_tolerance: Option<f64>,
}

impl Default for OutputParams {
    fn default() -> Self {
        OutputParams {
            path: Some(".".to_string()),
            write_npy: Some(true),
            compare_tolerance: Some(1e-3),
        }
    }
}

impl OutputParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.path.is_none() {
            self.path = defaults.path;
        }
        if self.write_npy.is_none() {
            self.write_npy = defaults.write_npy;
        }
        if self.compare_tolerance.is_none() {
            self.compare_tolerance = defaults.compare_tolerance;
        }
        self
    }
}

impl Config {
    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        self.zfs_params = self.zfs_params.with_defaults();
        self.output = self.output.with_defaults();
        self
    }

    /// Number of processes, from the command line or the file
    pub fn nprocs(&self, args: &Args) -> usize {
        args.nprocs.or(self.zfs_params.nprocs).unwrap_or(1)
    }

    /// Run options with command-line overrides applied
    pub fn zfs_options(&self, args: &Args) -> ZfsOptions {
        let defaults = ZfsOptions::default();
        let params = &self.zfs_params;
        ZfsOptions {
            memory: args.memory.or(params.memory).unwrap_or(defaults.memory),
            backend: args.backend.or(params.backend).unwrap_or(defaults.backend),
            imag_tolerance: params.imag_tolerance.unwrap_or(defaults.imag_tolerance),
            fail_on_imaginary: args.fail_on_imaginary
                || params.fail_on_imaginary.unwrap_or(defaults.fail_on_imaginary),
            progress_step: params.progress_step.unwrap_or(defaults.progress_step),
        }
    }

    pub fn fftgrid(&self, args: &Args) -> FftGridChoice {
        args.fftgrid.or(self.zfs_params.fftgrid).unwrap_or_default()
    }

    pub fn output_path(&self, args: &Args) -> String {
        args.path
            .clone()
            .or_else(|| self.output.path.clone())
            .unwrap_or_else(|| ".".to_string())
    }

    pub fn compare_tolerance(&self, args: &Args) -> f64 {
        args.compare_tolerance
            .or(self.output.compare_tolerance)
            .unwrap_or(1e-3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use wfc::{OrbitalShape, Spin};

    const MINIMAL: &str = r#"
system:
  lattice:
    - [10.0, 0.0, 0.0]
    - [0.0, 10.0, 0.0]
    - [0.0, 0.0, 10.0]
  density_grid: [16, 16, 16]
  ecut: 6.0
  orbitals:
    - { spin: up, band: 1, center: [4.0, 5.0, 5.0], width: 1.2, shape: px }
    - { spin: down, band: 1, center: [6.0, 5.0, 5.0], width: 1.2, occupation: 0.5 }
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = serde_yml::from_str::<Config>(MINIMAL).unwrap().with_defaults();
        assert_eq!(config.system.units, LengthUnit::Bohr);
        assert_eq!(config.system.orbitals.len(), 2);
        assert_eq!(config.system.orbitals[0].shape, OrbitalShape::Px);
        assert_eq!(config.system.orbitals[1].spin, Spin::Down);
        assert_eq!(config.system.orbitals[1].shape, OrbitalShape::S);
        assert_eq!(config.system.orbitals[1].occupation, 0.5);
        assert_eq!(config.zfs_params.nprocs, Some(1));
        assert_eq!(config.zfs_params.memory, Some(MemoryMode::Critical));
        assert_eq!(config.output.path.as_deref(), Some("."));
    }

    #[test]
    fn test_zfs_params_parsing() {
        let text = format!(
            "{}zfs_params:\n  nprocs: 4\n  memory: high\n  backend: serial\n  fftgrid: [12, 12, 12]\n",
            MINIMAL
        );
        let config = serde_yml::from_str::<Config>(&text).unwrap().with_defaults();
        assert_eq!(config.zfs_params.nprocs, Some(4));
        assert_eq!(config.zfs_params.memory, Some(MemoryMode::High));
        assert_eq!(config.zfs_params.backend, Some(Backend::Serial));
        assert_eq!(
            config.zfs_params.fftgrid,
            Some(FftGridChoice::Explicit([12, 12, 12]))
        );
        assert_eq!(config.zfs_params.imag_tolerance, Some(1e-4));

        let text = format!("{}zfs_params:\n  fftgrid: wave\n", MINIMAL);
        let config = serde_yml::from_str::<Config>(&text).unwrap();
        assert_eq!(config.zfs_params.fftgrid, Some(FftGridChoice::Wave));
    }

    #[test]
    fn test_invalid_memory_mode_rejected() {
        let text = format!("{}zfs_params:\n  memory: medium\n", MINIMAL);
        assert!(serde_yml::from_str::<Config>(&text).is_err());
    }

    #[test]
    fn test_command_line_overrides() {
        let config = serde_yml::from_str::<Config>(MINIMAL).unwrap().with_defaults();
        let args = Args::parse_from([
            "zfs",
            "--nprocs",
            "9",
            "--memory",
            "low",
            "--backend",
            "threaded",
            "--fftgrid",
            "wave",
            "--path",
            "out",
        ]);
        assert_eq!(config.nprocs(&args), 9);
        let options = config.zfs_options(&args);
        assert_eq!(options.memory, MemoryMode::Low);
        assert_eq!(options.backend, Backend::Threaded);
        assert_eq!(config.fftgrid(&args), FftGridChoice::Wave);
        assert_eq!(config.output_path(&args), "out");
        assert_eq!(config.compare_tolerance(&args), 1e-3);

        let bad = Args::try_parse_from(["zfs", "--memory", "medium"]);
        assert!(bad.is_err());
    }
}
