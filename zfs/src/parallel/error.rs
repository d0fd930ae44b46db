use thiserror::Error;

/// Failures of the process grid and its collectives. All of them are fatal
/// for the whole run.
#[derive(Debug, Error)]
pub enum ParallelError {
    #[error("at least one process is required")]
    NoProcesses,

    #[error("{nprocs} processes cannot form a square processor grid (use 1, 4, 9, 16, ...)")]
    NonSquareGrid { nprocs: usize },

    #[error("rank {rank} out of range for a communicator of size {size}")]
    InvalidRank { rank: usize, size: usize },

    #[error("message codec failure: {0}")]
    Codec(#[from] bincode::Error),

    #[error("run aborted by process {origin}")]
    Aborted { origin: usize },

    #[error("process {rank} panicked")]
    Panicked { rank: usize },

    #[error("process {rank} is no longer reachable")]
    Disconnected { rank: usize },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("unable to start process thread: {0}")]
    Spawn(#[source] std::io::Error),
}
