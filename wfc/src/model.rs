//! Analytic Gaussian orbitals
//!
//! A format-free orbital source: every orbital is an s- or p-type Gaussian
//! centred somewhere in the cell, expanded in plane waves up to a kinetic
//! energy cutoff. The Fourier coefficients are known in closed form,
//!
//! c(G) = f(G) exp(-sigma^2 |G|^2 / 2 - i G.R)
//!
//! with `f = 1` for s orbitals and `f = -i G_a` for p_a orbitals. Useful for
//! demonstrations and for tests that need a realistic but cheap input.

extern crate nalgebra as na;

use crate::cell::Cell;
use crate::error::WfcError;
use crate::ft::FourierTransform;
use crate::loader::{FftGridChoice, WavefunctionLoader, OCCUPATION_THRESHOLD};
use crate::wavefunction::{MemoryMode, Spin, Wavefunction};
use itertools::iproduct;
use na::Vector3;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrbitalShape {
    #[default]
    S,
    Px,
    Py,
    Pz,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOrbital {
    pub spin: Spin,
    pub band: usize,
    #[serde(default = "default_occupation")]
    pub occupation: f64,
    /// Cartesian position in bohr
    pub center: [f64; 3],
    /// Gaussian width sigma in bohr
    pub width: f64,
    #[serde(default)]
    pub shape: OrbitalShape,
}

fn default_occupation() -> f64 {
    1.0
}

#[derive(Debug, Clone)]
pub struct ModelLoader {
    cell: Cell,
    density_grid: [usize; 3],
    ecut: f64,
    fftgrid: FftGridChoice,
    orbitals: Vec<ModelOrbital>,
}

impl ModelLoader {
    /// # Arguments
    ///
    /// * `density_grid` - FFT grid of the charge density
    /// * `ecut` - plane-wave kinetic energy cutoff in Hartree
    pub fn new(
        cell: Cell,
        density_grid: [usize; 3],
        ecut: f64,
        orbitals: Vec<ModelOrbital>,
    ) -> Result<Self, WfcError> {
        if density_grid.iter().any(|&n| n < 2) {
            return Err(WfcError::InvalidGrid(format!("{:?}", density_grid)));
        }
        if !(ecut > 0.0) {
            return Err(WfcError::InvalidOrbital(format!(
                "cutoff must be positive, got {}",
                ecut
            )));
        }

        let mut seen = HashSet::new();
        for orb in &orbitals {
            if !(orb.width > 0.0) {
                return Err(WfcError::InvalidOrbital(format!(
                    "{} band {}: width must be positive, got {}",
                    orb.spin, orb.band, orb.width
                )));
            }
            if !seen.insert((orb.spin, orb.band)) {
                return Err(WfcError::InvalidOrbital(format!(
                    "{} band {} defined twice",
                    orb.spin, orb.band
                )));
            }
        }

        Ok(ModelLoader {
            cell,
            density_grid,
            ecut,
            fftgrid: FftGridChoice::Density,
            orbitals,
        })
    }

    pub fn with_fftgrid(mut self, fftgrid: FftGridChoice) -> Self {
        self.fftgrid = fftgrid;
        self
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn orbitals(&self) -> &[ModelOrbital] {
        &self.orbitals
    }

    /// Grid on which plane-wave frequencies are enumerated.
    pub fn wave_grid(&self) -> [usize; 3] {
        self.density_grid.map(|n| (n / 2).max(1))
    }

    /// Frequencies inside the wave grid whose kinetic energy is below the cutoff.
    pub fn plane_waves(&self) -> Vec<[i32; 3]> {
        let [m1, m2, m3] = self.wave_grid().map(|n| ((n - 1) / 2) as i32);
        iproduct!(-m1..=m1, -m2..=m2, -m3..=m3)
            .map(|(a, b, c)| [a, b, c])
            .filter(|m| self.cell.gvector(*m).norm_squared() / 2.0 <= self.ecut)
            .collect()
    }

    fn find(&self, spin: Spin, band: usize) -> Option<&ModelOrbital> {
        self.orbitals
            .iter()
            .find(|orb| orb.spin == spin && orb.band == band)
    }

    fn coefficients(&self, orb: &ModelOrbital, gvecs: &[[i32; 3]]) -> Vec<Complex64> {
        let r = Vector3::from(orb.center);
        let s2 = orb.width * orb.width;
        gvecs
            .iter()
            .map(|m| {
                let g = self.cell.gvector(*m);
                let envelope = (-0.5 * s2 * g.norm_squared()).exp();
                let phase = Complex64::new(0.0, -g.dot(&r)).exp();
                let f = match orb.shape {
                    OrbitalShape::S => Complex64::new(1.0, 0.0),
                    OrbitalShape::Px => Complex64::new(0.0, -g.x),
                    OrbitalShape::Py => Complex64::new(0.0, -g.y),
                    OrbitalShape::Pz => Complex64::new(0.0, -g.z),
                };
                f * envelope * phase
            })
            .collect()
    }
}

impl WavefunctionLoader for ModelLoader {
    fn scan(&self, memory: MemoryMode) -> Result<Wavefunction, WfcError> {
        let occupied: Vec<(Spin, usize)> = self
            .orbitals
            .iter()
            .filter(|orb| orb.occupation > OCCUPATION_THRESHOLD)
            .map(|orb| (orb.spin, orb.band))
            .collect();
        if occupied.is_empty() {
            return Err(WfcError::NoOrbitals);
        }

        let [n1, n2, n3] = self.fftgrid.resolve(self.density_grid)?;
        let ft = FourierTransform::new(n1, n2, n3);
        let gvecs = self.plane_waves();
        info!(
            "model orbitals: {} of {} occupied, {} plane waves, FFT grid {}",
            occupied.len(),
            self.orbitals.len(),
            gvecs.len(),
            ft
        );

        Wavefunction::new(self.cell.clone(), ft, occupied, gvecs, memory)
    }

    fn load(&self, wfc: &mut Wavefunction, iorbs: &BTreeSet<usize>) -> Result<(), WfcError> {
        let gvecs = wfc.gvecs().to_vec();
        for &iorb in iorbs {
            let (spin, band) = wfc.spin_band(iorb)?;
            let orb = self.find(spin, band).ok_or_else(|| {
                WfcError::InvalidOrbital(format!("{} band {} not in model", spin, band))
            })?;
            let coeffs = self.coefficients(orb, &gvecs);
            wfc.set_psig(iorb, coeffs)?;
        }
        debug!("loaded {} model orbitals", iorbs.len());
        wfc.apply_memory_policy();
        Ok(())
    }
}
