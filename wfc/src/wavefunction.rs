//! Container of Kohn-Sham orbitals
//!
//! Orbitals are labelled by a `(spin, band)` pair and mapped onto a dense
//! integer index: all up-spin orbitals first (ascending band), then all
//! down-spin orbitals. What the container keeps in memory is decided by a
//! [`MemoryMode`] fixed at construction; the accessors `get_psir` and
//! `get_rhog` hide whether a quantity is cached or recomputed.

use crate::cell::Cell;
use crate::error::WfcError;
use crate::ft::{freq_index, FourierTransform};
use ndarray::Array3;
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spin {
    Up,
    Down,
}

impl fmt::Display for Spin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Spin::Up => write!(f, "up"),
            Spin::Down => write!(f, "down"),
        }
    }
}

/// Caching policy of the orbital container.
///
/// * `High`: keep real-space orbitals and single-orbital densities in G space
/// * `Low`: keep real-space orbitals, recompute densities when needed
/// * `Critical`: keep only plane-wave coefficients, recompute everything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    High,
    Low,
    Critical,
}

impl Default for MemoryMode {
    fn default() -> Self {
        MemoryMode::Critical
    }
}

impl FromStr for MemoryMode {
    type Err = WfcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(MemoryMode::High),
            "low" => Ok(MemoryMode::Low),
            "critical" => Ok(MemoryMode::Critical),
            _ => Err(WfcError::InvalidMemoryMode(s.to_string())),
        }
    }
}

impl fmt::Display for MemoryMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            MemoryMode::High => "high",
            MemoryMode::Low => "low",
            MemoryMode::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

pub struct Wavefunction {
    cell: Cell,
    ft: FourierTransform,
    memory: MemoryMode,

    nuorbs: usize,
    ndorbs: usize,
    iorb_sb_map: Vec<(Spin, usize)>,
    sb_iorb_map: HashMap<(Spin, usize), usize>,

    /// Integer frequencies of the plane-wave coefficients, shared by all orbitals.
    gvecs: Arc<Vec<[i32; 3]>>,

    psig: HashMap<usize, Vec<Complex64>>,
    psir: HashMap<usize, Array3<Complex64>>,
    rhog: HashMap<usize, Array3<Complex64>>,
}

impl Wavefunction {
    /// Create an empty container.
    ///
    /// # Arguments
    ///
    /// * `orbitals` - `(spin, band)` labels; reordered up-spin first, ascending band
    /// * `gvecs` - frequencies of the plane-wave coefficients on the grid of `ft`
    pub fn new(
        cell: Cell,
        ft: FourierTransform,
        mut orbitals: Vec<(Spin, usize)>,
        gvecs: Vec<[i32; 3]>,
        memory: MemoryMode,
    ) -> Result<Self, WfcError> {
        if orbitals.is_empty() {
            return Err(WfcError::NoOrbitals);
        }
        orbitals.sort();
        orbitals.dedup();

        // |m| < n/2 on every axis, so distinct frequencies land on distinct grid points
        let shape = ft.shape();
        let mut seen = HashSet::with_capacity(gvecs.len());
        for g in &gvecs {
            for k in 0..3 {
                if 2 * g[k].unsigned_abs() as usize >= shape[k] {
                    return Err(WfcError::InvalidGrid(format!(
                        "frequency {:?} does not fit on a {} grid",
                        g, ft
                    )));
                }
            }
            if !seen.insert(*g) {
                return Err(WfcError::InvalidGrid(format!(
                    "frequency {:?} appears twice",
                    g
                )));
            }
        }

        let nuorbs = orbitals.iter().filter(|(s, _)| *s == Spin::Up).count();
        let ndorbs = orbitals.len() - nuorbs;
        let sb_iorb_map = orbitals
            .iter()
            .enumerate()
            .map(|(iorb, sb)| (*sb, iorb))
            .collect();

        Ok(Wavefunction {
            cell,
            ft,
            memory,
            nuorbs,
            ndorbs,
            iorb_sb_map: orbitals,
            sb_iorb_map,
            gvecs: Arc::new(gvecs),
            psig: HashMap::new(),
            psir: HashMap::new(),
            rhog: HashMap::new(),
        })
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn ft(&self) -> &FourierTransform {
        &self.ft
    }

    pub fn memory(&self) -> MemoryMode {
        self.memory
    }

    pub fn norbs(&self) -> usize {
        self.nuorbs + self.ndorbs
    }

    pub fn nuorbs(&self) -> usize {
        self.nuorbs
    }

    pub fn ndorbs(&self) -> usize {
        self.ndorbs
    }

    pub fn gvecs(&self) -> &[[i32; 3]] {
        &self.gvecs
    }

    pub fn spin_band(&self, iorb: usize) -> Result<(Spin, usize), WfcError> {
        self.iorb_sb_map
            .get(iorb)
            .copied()
            .ok_or(WfcError::UnknownOrbital {
                iorb,
                norbs: self.norbs(),
            })
    }

    pub fn iorb(&self, spin: Spin, band: usize) -> Option<usize> {
        self.sb_iorb_map.get(&(spin, band)).copied()
    }

    /// Store plane-wave coefficients of orbital `iorb`.
    pub fn set_psig(&mut self, iorb: usize, coeffs: Vec<Complex64>) -> Result<(), WfcError> {
        self.spin_band(iorb)?;
        if coeffs.len() != self.gvecs.len() {
            return Err(WfcError::CoefficientLength {
                iorb,
                expected: self.gvecs.len(),
                found: coeffs.len(),
            });
        }
        self.psig.insert(iorb, coeffs);
        Ok(())
    }

    /// Apply the memory policy to everything loaded so far.
    pub fn apply_memory_policy(&mut self) {
        match self.memory {
            MemoryMode::High => {
                self.compute_all_psir();
                self.psig.clear();
                self.compute_all_rhog();
            }
            MemoryMode::Low => {
                self.compute_all_psir();
                self.psig.clear();
            }
            MemoryMode::Critical => {}
        }
        debug!(
            "memory policy {} applied: {} psig, {} psir, {} rhog cached",
            self.memory,
            self.psig.len(),
            self.psir.len(),
            self.rhog.len()
        );
    }

    /// Whether orbital `iorb` can be served on this process.
    pub fn is_loaded(&self, iorb: usize) -> bool {
        self.psir.contains_key(&iorb) || self.psig.contains_key(&iorb)
    }

    /// Check that every orbital of `iorbs` is loaded and that cached arrays sit on the FFT grid.
    pub fn check_loaded(&self, iorbs: &BTreeSet<usize>) -> Result<(), WfcError> {
        let expected = self.ft.shape();
        for &iorb in iorbs {
            self.spin_band(iorb)?;
            if !self.is_loaded(iorb) {
                return Err(WfcError::OrbitalNotLoaded(iorb));
            }
            for arr in [self.psir.get(&iorb), self.rhog.get(&iorb)].into_iter().flatten() {
                if !self.ft.matches(arr) {
                    let (d1, d2, d3) = arr.dim();
                    return Err(WfcError::GridMismatch {
                        expected,
                        found: [d1, d2, d3],
                    });
                }
            }
        }
        Ok(())
    }

    /// Real-space orbital, normalised to one electron in the cell.
    pub fn get_psir(&self, iorb: usize) -> Result<Cow<'_, Array3<Complex64>>, WfcError> {
        if let Some(psir) = self.psir.get(&iorb) {
            return Ok(Cow::Borrowed(psir));
        }
        match self.psig.get(&iorb) {
            Some(coeffs) => Ok(Cow::Owned(self.compute_psir(coeffs))),
            None => Err(WfcError::OrbitalNotLoaded(iorb)),
        }
    }

    /// Single-orbital density in G space; only cached in `High` mode.
    pub fn get_rhog(&self, iorb: usize) -> Option<&Array3<Complex64>> {
        self.rhog.get(&iorb)
    }

    /// Density `|psi(r)|^2` in G space.
    pub fn compute_rhog(&self, psir: &Array3<Complex64>) -> Array3<Complex64> {
        let rhor = psir.mapv(|v| Complex64::new(v.norm_sqr(), 0.0));
        self.ft.forward(&rhor)
    }

    fn compute_psir(&self, coeffs: &[Complex64]) -> Array3<Complex64> {
        let [n1, n2, n3] = self.ft.shape();
        let mut grid = Array3::<Complex64>::zeros((n1, n2, n3));
        for (g, c) in self.gvecs.iter().zip(coeffs.iter()) {
            grid[[freq_index(g[0], n1), freq_index(g[1], n2), freq_index(g[2], n3)]] = *c;
        }
        self.ft.backward_inplace(&mut grid);
        self.normalize(&mut grid);
        grid
    }

    fn normalize(&self, psir: &mut Array3<Complex64>) {
        let sum: f64 = psir.iter().map(|v| v.norm_sqr()).sum();
        let norm = (sum * self.cell.omega() / self.ft.ntot() as f64).sqrt();
        if norm > 0.0 {
            psir.mapv_inplace(|v| v / norm);
        }
    }

    fn compute_all_psir(&mut self) {
        let psir: Vec<(usize, Array3<Complex64>)> = self
            .psig
            .par_iter()
            .map(|(iorb, coeffs)| (*iorb, self.compute_psir(coeffs)))
            .collect();
        self.psir.extend(psir);
    }

    fn compute_all_rhog(&mut self) {
        let rhog: Vec<(usize, Array3<Complex64>)> = self
            .psir
            .par_iter()
            .map(|(iorb, psir)| (*iorb, self.compute_rhog(psir)))
            .collect();
        self.rhog.extend(rhog);
    }

    /// Bytes held by each cache.
    pub fn memory_usage(&self) -> Vec<(&'static str, usize)> {
        let c = std::mem::size_of::<Complex64>();
        vec![
            ("psig", self.psig.values().map(|v| v.len() * c).sum()),
            ("psir", self.psir.values().map(|v| v.len() * c).sum()),
            ("rhog", self.rhog.values().map(|v| v.len() * c).sum()),
        ]
    }
}

impl fmt::Debug for Wavefunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Wavefunction")
            .field("ft", &self.ft)
            .field("memory", &self.memory)
            .field("nuorbs", &self.nuorbs)
            .field("ndorbs", &self.ndorbs)
            .field("npw", &self.gvecs.len())
            .finish()
    }
}
