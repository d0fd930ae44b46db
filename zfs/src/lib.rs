//! Distributed zero-field-splitting tensor engine
//!
//! Orbitals come from the [`wfc`] crate; this crate distributes orbital pairs
//! over a square grid of processes, contracts each pair density with the
//! dipole-dipole kernel and reduces the result to the D tensor.

pub mod app;
pub mod config;
pub mod io;
pub mod parallel;
pub mod zfs_impl;

pub use zfs_impl::{ZfsCalculation, ZfsError, ZfsOptions, ZfsResult, ZfsTensor};
