//! Distributed-memory building blocks
//!
//! A channel-based stand-in for MPI ([`World`], [`Communicator`]), the square
//! processor grid built on top of it, and the symmetric matrix distributed
//! over that grid.

mod comm;
mod error;
mod grid;
mod matrix;
#[cfg(test)]
mod tests;

pub use comm::{Communicator, World, RESERVED_TAGS};
pub use error::ParallelError;
pub use grid::ProcessorGrid;
pub use matrix::{block_range, SymmetricDistributedMatrix, TriuIter};
