use std::f64::consts::PI;
use wfc::units::{BOHR_MAGNETON, BOHR_TO_M, ELECTRON_G, JOULE_TO_MHZ, MU0};

/// Physical constants and unit conversions multiplying every pair
/// contribution; turns bohr^-3 into MHz.
///
/// 1/4 * mu0 / (4 pi) * (g_e mu_B)^2 / bohr^3
pub fn prefactor() -> f64 {
    let gmu = ELECTRON_G * BOHR_MAGNETON;
    0.25 * MU0 / (4.0 * PI) * gmu * gmu / BOHR_TO_M.powi(3) * JOULE_TO_MHZ
}
