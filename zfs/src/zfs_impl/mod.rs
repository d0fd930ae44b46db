//! Zero-field-splitting tensor from first principles
//!
//! The spin-spin contribution to the ZFS tensor of a high-spin state is a sum
//! over pairs of occupied orbitals,
//!
//! D_ab = 1/2 (mu0 / 4 pi) (g_e mu_B)^2 sum_{i<j} chi_ij
//!        <Phi_ij| (r^2 delta_ab - 3 r_a r_b) / r^5 |Phi_ij>
//!
//! where `Phi_ij` is the two-electron determinant of orbitals `i` and `j` and
//! `chi_ij` is `+1` for parallel and `-1` for antiparallel spins. Each term is
//! evaluated in reciprocal space as the contraction of a dipole-dipole kernel
//! with the pair density of the two orbitals.
//!
//! # Usage
//!
//! ```ignore
//! let grid = ProcessorGrid::new(comm)?;
//! let calculation = ZfsCalculation::new(&grid, &loader, ZfsOptions::default());
//! let result = calculation.solve()?;
//! println!("D = {:.2} MHz, E = {:.2} MHz", result.tensor.d_value, result.tensor.e_value);
//! ```

mod calculation;
mod contraction;
mod counter;
mod ddi;
mod prefactor;
mod rhog;
mod tensor;

pub use calculation::{chi, imaginary_ratio, ZfsCalculation, ZfsError, ZfsOptions, ZfsResult};
pub use contraction::{
    select_contraction, Backend, PairContraction, SerialContraction, ThreadedContraction,
};
pub use counter::ProgressCounter;
pub use ddi::{compute_ddig, COMPONENTS};
pub use prefactor::prefactor;
pub use rhog::compute_rhog;
pub use tensor::ZfsTensor;
