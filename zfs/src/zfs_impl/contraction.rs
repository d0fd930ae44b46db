//! Contraction of a pair density against the dipole-dipole kernel
//!
//! Two interchangeable strategies are provided. The strategy is picked once
//! per run by [`select_contraction`] and used for every pair.

use ndarray::{Array3, Array4, Axis, Zip};
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// `sum_G ddig[c, G] * rhog[G]` for each of the six kernel components.
pub trait PairContraction: Send + Sync {
    fn name(&self) -> &'static str;

    fn contract(&self, ddig: &Array4<f64>, rhog: &Array3<Complex64>) -> [Complex64; 6];
}

pub struct SerialContraction;

impl PairContraction for SerialContraction {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn contract(&self, ddig: &Array4<f64>, rhog: &Array3<Complex64>) -> [Complex64; 6] {
        let mut out = [Complex64::new(0.0, 0.0); 6];
        for (c, kernel) in ddig.axis_iter(Axis(0)).enumerate().take(6) {
            out[c] = Zip::from(&kernel)
                .and(rhog)
                .fold(Complex64::new(0.0, 0.0), |acc, &k, &r| acc + r * k);
        }
        out
    }
}

/// Splits every component sum over the rayon pool.
pub struct ThreadedContraction;

impl PairContraction for ThreadedContraction {
    fn name(&self) -> &'static str {
        "threaded"
    }

    fn contract(&self, ddig: &Array4<f64>, rhog: &Array3<Complex64>) -> [Complex64; 6] {
        let rhog_slice = match rhog.as_slice() {
            Some(slice) => slice,
            None => return SerialContraction.contract(ddig, rhog),
        };

        let mut out = [Complex64::new(0.0, 0.0); 6];
        for (c, kernel) in ddig.axis_iter(Axis(0)).enumerate().take(6) {
            out[c] = match kernel.as_slice() {
                Some(kernel_slice) => kernel_slice
                    .par_iter()
                    .zip(rhog_slice.par_iter())
                    .map(|(&k, &r)| r * k)
                    .sum(),
                None => Zip::from(&kernel)
                    .and(rhog)
                    .fold(Complex64::new(0.0, 0.0), |acc, &k, &r| acc + r * k),
            };
        }
        out
    }
}

/// Requested contraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Threaded when more than one worker thread is available
    #[default]
    Auto,
    Serial,
    Threaded,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "serial" => Ok(Backend::Serial),
            "threaded" => Ok(Backend::Threaded),
            other => Err(format!(
                "unknown backend `{}` (expected auto, serial or threaded)",
                other
            )),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Backend::Auto => "auto",
            Backend::Serial => "serial",
            Backend::Threaded => "threaded",
        };
        write!(f, "{}", name)
    }
}

fn threads_available() -> bool {
    rayon::current_num_threads() > 1
}

/// Pick the contraction strategy for this run.
pub fn select_contraction(backend: Backend, verbose: bool) -> Box<dyn PairContraction> {
    let selected: Box<dyn PairContraction> = match backend {
        Backend::Serial => Box::new(SerialContraction),
        Backend::Threaded if threads_available() => Box::new(ThreadedContraction),
        Backend::Threaded => {
            if verbose {
                warn!("threaded contraction requested but only one worker thread is available; using serial");
            }
            Box::new(SerialContraction)
        }
        Backend::Auto if threads_available() => Box::new(ThreadedContraction),
        Backend::Auto => Box::new(SerialContraction),
    };
    if verbose {
        info!("Pair contraction: {} ({} requested)", selected.name(), backend);
    }
    selected
}
