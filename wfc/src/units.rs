//! Physical constants and unit conversions (SI, CODATA 2018).

/// Planck constant, J s
pub const PLANCK: f64 = 6.626_070_15e-34;
/// Vacuum magnetic permeability, N A^-2
pub const MU0: f64 = 1.256_637_062_12e-6;
/// Electron g factor
pub const ELECTRON_G: f64 = -2.002_319_304_362_56;
/// Bohr magneton, J T^-1
pub const BOHR_MAGNETON: f64 = 9.274_010_078_3e-24;

pub const BOHR_TO_ANGSTROM: f64 = 0.52918;
pub const ANGSTROM_TO_BOHR: f64 = 1.0 / BOHR_TO_ANGSTROM;
pub const ANGSTROM_TO_M: f64 = 1.0e-10;
pub const BOHR_TO_M: f64 = BOHR_TO_ANGSTROM * ANGSTROM_TO_M;

pub const JOULE_TO_MHZ: f64 = 1.0e-6 / PLANCK;
