use super::contraction::{select_contraction, Backend};
use super::counter::ProgressCounter;
use super::ddi::compute_ddig;
use super::prefactor::prefactor;
use super::rhog::compute_rhog;
use super::tensor::ZfsTensor;
use crate::parallel::{ParallelError, ProcessorGrid, SymmetricDistributedMatrix};
use ndarray::{Array3, Array4};
use num_complex::Complex64;
use std::collections::BTreeSet;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use wfc::{MemoryMode, Spin, Wavefunction, WavefunctionLoader, WfcError};

#[derive(Debug, Error)]
pub enum ZfsError {
    #[error(transparent)]
    Wavefunction(#[from] WfcError),

    #[error(transparent)]
    Parallel(#[from] ParallelError),

    #[error(
        "pair ({i}, {j}): imaginary part is {ratio:.3e} of the real part (tolerance {tolerance:.1e})"
    )]
    ImaginaryContribution {
        i: usize,
        j: usize,
        ratio: f64,
        tolerance: f64,
    },
}

/// Run-wide settings of a ZFS calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct ZfsOptions {
    pub memory: MemoryMode,
    pub backend: Backend,
    /// Largest accepted `max|Im| / max|Re|` of a pair contraction
    pub imag_tolerance: f64,
    pub fail_on_imaginary: bool,
    /// Progress report interval in percent
    pub progress_step: usize,
}

impl Default for ZfsOptions {
    fn default() -> Self {
        ZfsOptions {
            memory: MemoryMode::Critical,
            backend: Backend::Auto,
            imag_tolerance: 1e-4,
            fail_on_imaginary: false,
            progress_step: 10,
        }
    }
}

/// Outcome of a calculation; identical on every process.
#[derive(Debug, Clone)]
pub struct ZfsResult {
    /// Pair contributions `(norbs, norbs, 6)` in MHz
    pub iglobal: Array3<f64>,
    pub tensor: ZfsTensor,
    pub norbs: usize,
    pub nuorbs: usize,
    pub ndorbs: usize,
    pub nprocs: usize,
    pub memory: MemoryMode,
    /// Largest imaginary/real ratio over all pairs
    pub max_imag_ratio: f64,
}

/// Spin factor of a pair: `+1` for parallel spins, `-1` otherwise.
pub fn chi(s1: Spin, s2: Spin) -> f64 {
    if s1 == s2 {
        1.0
    } else {
        -1.0
    }
}

/// `max|Im| / max|Re|` over the components; zero when both vanish.
pub fn imaginary_ratio(values: &[Complex64]) -> f64 {
    let max_re = values.iter().map(|v| v.re.abs()).fold(0.0, f64::max);
    let max_im = values.iter().map(|v| v.im.abs()).fold(0.0, f64::max);
    if max_im == 0.0 {
        0.0
    } else if max_re == 0.0 {
        f64::INFINITY
    } else {
        max_im / max_re
    }
}

/// Zero-field-splitting tensor from pairwise dipole-dipole interactions.
///
/// Pairs of orbitals are distributed over a square processor grid. Each
/// process loads only the orbitals its block of the pair matrix refers to.
pub struct ZfsCalculation<'a> {
    grid: &'a ProcessorGrid,
    loader: &'a dyn WavefunctionLoader,
    options: ZfsOptions,
}

impl<'a> ZfsCalculation<'a> {
    pub fn new(
        grid: &'a ProcessorGrid,
        loader: &'a dyn WavefunctionLoader,
        options: ZfsOptions,
    ) -> Self {
        ZfsCalculation {
            grid,
            loader,
            options,
        }
    }

    pub fn options(&self) -> &ZfsOptions {
        &self.options
    }

    /// Collective over the grid.
    pub fn solve(&self) -> Result<ZfsResult, ZfsError> {
        let onroot = self.grid.onroot();
        let comm = self.grid.comm();
        if onroot {
            info!("\nZero field splitting calculation\n");
            info!("Memory mode: {}", self.options.memory);
        }
        self.grid.print_info();

        let mut wfc = self.loader.scan(self.options.memory)?;
        let norbs = wfc.norbs();
        if onroot {
            info!(
                "{} orbitals ({} up, {} down) on a {} FFT grid",
                norbs,
                wfc.nuorbs(),
                wfc.ndorbs(),
                wfc.ft()
            );
            info!("{}", wfc.cell());
        }

        let mut pairs = SymmetricDistributedMatrix::new(self.grid, (norbs, norbs, 6))?;
        pairs.print_info("I");

        comm.barrier()?;
        let t0 = Instant::now();
        let iorbs: BTreeSet<usize> = (pairs.mstart()..pairs.mend())
            .chain(pairs.nstart()..pairs.nend())
            .collect();
        self.loader.load(&mut wfc, &iorbs)?;
        wfc.check_loaded(&iorbs)?;
        comm.barrier()?;
        if onroot {
            info!(
                "Time elapsed for loading orbitals: {:.1}s",
                t0.elapsed().as_secs_f64()
            );
        }

        if onroot {
            info!("\nComputing dipole-dipole interaction tensor in G space...\n");
        }
        let ddig = compute_ddig(wfc.cell(), wfc.ft());

        let contraction = select_contraction(self.options.backend, onroot);
        let fac = prefactor() * wfc.cell().omega().powi(2);

        comm.barrier()?;
        let t1 = Instant::now();
        if onroot {
            info!("\nIterating over pairs...\n");
        }
        let cells: Vec<(usize, usize)> = pairs.triu_iter().collect();
        let mut counter = ProgressCounter::new(
            "(process 0) pairs",
            cells.len(),
            self.options.progress_step,
            onroot,
        );

        let mut max_imag_ratio = 0.0f64;
        for (iloc, jloc) in cells {
            let (i, j) = pairs.ltog(iloc, jloc);
            if i == j {
                counter.tick();
                continue;
            }
            let (s1, _) = wfc.spin_band(i)?;
            let (s2, _) = wfc.spin_band(j)?;

            let psi1r = wfc.get_psir(i)?;
            let psi2r = wfc.get_psir(j)?;
            let rhog = compute_rhog(&psi1r, &psi2r, wfc.ft(), wfc.get_rhog(i), wfc.get_rhog(j));
            let raw = contraction.contract(&ddig, &rhog);

            let ratio = imaginary_ratio(&raw);
            max_imag_ratio = max_imag_ratio.max(ratio);
            if ratio > self.options.imag_tolerance {
                if self.options.fail_on_imaginary {
                    return Err(ZfsError::ImaginaryContribution {
                        i,
                        j,
                        ratio,
                        tolerance: self.options.imag_tolerance,
                    });
                }
                warn!(
                    "pair ({}, {}): imaginary part is {:.3e} of the real part",
                    i, j, ratio
                );
            }

            let values = raw.map(|v| chi(s1, s2) * fac * v.re);
            pairs.write(iloc, jloc, &values);
            counter.tick();
        }
        debug!("{} pairs computed locally", counter.count());

        pairs.symmetrize()?;
        let iglobal = pairs.collect()?;
        let max_imag_ratio = comm
            .all_gather(max_imag_ratio)?
            .into_iter()
            .fold(0.0, f64::max);

        let tensor = ZfsTensor::from_pair_matrix(&iglobal);
        self.print_memory_usage(&wfc, &ddig, &pairs, &iglobal)?;

        if onroot {
            info!(
                "Time elapsed for pair iteration: {:.1}s",
                t1.elapsed().as_secs_f64()
            );
            info!("Largest imaginary/real ratio over all pairs: {:.3e}", max_imag_ratio);
        }

        Ok(ZfsResult {
            iglobal,
            tensor,
            norbs,
            nuorbs: wfc.nuorbs(),
            ndorbs: wfc.ndorbs(),
            nprocs: self.grid.size(),
            memory: self.options.memory,
            max_imag_ratio,
        })
    }

    fn print_memory_usage(
        &self,
        wfc: &Wavefunction,
        ddig: &Array4<f64>,
        pairs: &SymmetricDistributedMatrix,
        iglobal: &Array3<f64>,
    ) -> Result<(), ParallelError> {
        let f = std::mem::size_of::<f64>();
        let mut usage = wfc.memory_usage();
        usage.push(("ddig", ddig.len() * f));
        usage.push(("I", pairs.nbytes()));
        usage.push(("Iglobal", iglobal.len() * f));

        let local: usize = usage.iter().map(|(_, n)| n).sum();
        let total = self.grid.comm().all_reduce_sum(local)?;

        if self.grid.onroot() {
            let mb = |n: usize| n as f64 / 1024f64.powi(2);
            info!("\nArray memory (on process 0):");
            for (name, nbytes) in &usage {
                info!("  {:10} {:.2} MB", name, mb(*nbytes));
            }
            info!("Total array memory (on process 0): {:.2} MB", mb(local));
            info!("Total array memory (all processes): {:.2} MB", mb(total));
        }
        Ok(())
    }
}
