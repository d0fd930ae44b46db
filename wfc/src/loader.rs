//! Interface between orbital sources and the [`Wavefunction`] container

use crate::error::WfcError;
use crate::wavefunction::{MemoryMode, Wavefunction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Orbitals with occupation at or below this value are ignored.
pub const OCCUPATION_THRESHOLD: f64 = 0.8;

/// A source of Kohn-Sham orbitals.
///
/// `scan` is cheap and describes the system; `load` does the heavy lifting for
/// the orbitals a process actually needs. Loaders are shared by all worker
/// processes, hence `Send + Sync`.
pub trait WavefunctionLoader: Send + Sync {
    /// Build an empty container: cell, FFT grid, orbital maps and plane-wave set.
    fn scan(&self, memory: MemoryMode) -> Result<Wavefunction, WfcError>;

    /// Fill plane-wave coefficients of `iorbs` and apply the memory policy.
    fn load(&self, wfc: &mut Wavefunction, iorbs: &BTreeSet<usize>) -> Result<(), WfcError>;
}

/// Which FFT grid orbitals are put on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "GridRepr", into = "GridRepr")]
pub enum FftGridChoice {
    /// The full density grid of the source
    #[default]
    Density,
    /// Half the density grid along each axis
    Wave,
    Explicit([usize; 3]),
}

impl FftGridChoice {
    /// Grid dimensions for a source whose density grid is `density`.
    pub fn resolve(&self, density: [usize; 3]) -> Result<[usize; 3], WfcError> {
        let grid = match self {
            FftGridChoice::Density => density,
            FftGridChoice::Wave => density.map(|n| (n / 2).max(1)),
            FftGridChoice::Explicit(n) => *n,
        };
        if grid.iter().any(|&n| n == 0) {
            return Err(WfcError::InvalidGrid(format!("{:?}", grid)));
        }
        Ok(grid)
    }
}

impl FromStr for FftGridChoice {
    type Err = WfcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "density" => return Ok(FftGridChoice::Density),
            "wave" => return Ok(FftGridChoice::Wave),
            _ => {}
        }

        let dims: Vec<usize> = s
            .trim_matches(|c| c == '[' || c == ']')
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<usize>())
            .collect::<Result<_, _>>()
            .map_err(|_| WfcError::InvalidGrid(s.to_string()))?;
        match dims.as_slice() {
            [n1, n2, n3] if *n1 > 0 && *n2 > 0 && *n3 > 0 => {
                Ok(FftGridChoice::Explicit([*n1, *n2, *n3]))
            }
            _ => Err(WfcError::InvalidGrid(s.to_string())),
        }
    }
}

impl fmt::Display for FftGridChoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FftGridChoice::Density => write!(f, "density"),
            FftGridChoice::Wave => write!(f, "wave"),
            FftGridChoice::Explicit([n1, n2, n3]) => write!(f, "{},{},{}", n1, n2, n3),
        }
    }
}

/// YAML form: either a name or a list of three integers.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GridRepr {
    Name(String),
    Shape([usize; 3]),
}

impl TryFrom<GridRepr> for FftGridChoice {
    type Error = WfcError;

    fn try_from(repr: GridRepr) -> Result<Self, Self::Error> {
        match repr {
            GridRepr::Name(name) => name.parse(),
            GridRepr::Shape(n) => FftGridChoice::from_str(&format!("{},{},{}", n[0], n[1], n[2])),
        }
    }
}

impl From<FftGridChoice> for GridRepr {
    fn from(choice: FftGridChoice) -> Self {
        match choice {
            FftGridChoice::Explicit(n) => GridRepr::Shape(n),
            other => GridRepr::Name(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_choice_parsing() {
        assert_eq!("density".parse::<FftGridChoice>().unwrap(), FftGridChoice::Density);
        assert_eq!("Wave".parse::<FftGridChoice>().unwrap(), FftGridChoice::Wave);
        assert_eq!(
            "12, 12,16".parse::<FftGridChoice>().unwrap(),
            FftGridChoice::Explicit([12, 12, 16])
        );
        assert_eq!(
            "[8 8 8]".parse::<FftGridChoice>().unwrap(),
            FftGridChoice::Explicit([8, 8, 8])
        );
        assert!("8,8".parse::<FftGridChoice>().is_err());
        assert!("0,8,8".parse::<FftGridChoice>().is_err());
        assert!("fine".parse::<FftGridChoice>().is_err());
    }

    #[test]
    fn test_grid_choice_resolve() {
        assert_eq!(FftGridChoice::Density.resolve([20, 20, 30]).unwrap(), [20, 20, 30]);
        assert_eq!(FftGridChoice::Wave.resolve([20, 21, 30]).unwrap(), [10, 10, 15]);
        assert_eq!(
            FftGridChoice::Explicit([9, 9, 9]).resolve([20, 20, 20]).unwrap(),
            [9, 9, 9]
        );
    }
}
