use thiserror::Error;

/// Errors raised while describing or loading orbitals.
#[derive(Debug, Error)]
pub enum WfcError {
    #[error("invalid memory mode `{0}` (expected high, low or critical)")]
    InvalidMemoryMode(String),

    #[error("invalid FFT grid specification `{0}`")]
    InvalidGrid(String),

    #[error("FFT grid mismatch: expected {expected:?}, found {found:?}")]
    GridMismatch {
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("invalid cell: {0}")]
    InvalidCell(String),

    #[error("orbital {iorb}: expected {expected} plane-wave coefficients, got {found}")]
    CoefficientLength {
        iorb: usize,
        expected: usize,
        found: usize,
    },

    #[error("orbital {0} is not loaded on this process")]
    OrbitalNotLoaded(usize),

    #[error("orbital index {iorb} out of range (norbs = {norbs})")]
    UnknownOrbital { iorb: usize, norbs: usize },

    #[error("no orbital passes the occupation threshold")]
    NoOrbitals,

    #[error("invalid model orbital: {0}")]
    InvalidOrbital(String),
}
