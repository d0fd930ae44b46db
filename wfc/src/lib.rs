//! Orbital-side inputs for zero-field-splitting calculations
//!
//! This crate provides everything the ZFS engine needs to know about the
//! electronic structure: the periodic cell, the FFT grid, and a container of
//! Kohn-Sham orbitals whose caching behaviour is selected by a memory mode.
//! Orbitals enter the container through the [`WavefunctionLoader`] trait.

pub mod cell;
pub mod error;
pub mod ft;
pub mod loader;
pub mod model;
pub mod units;
pub mod wavefunction;

pub use cell::Cell;
pub use error::WfcError;
pub use ft::FourierTransform;
pub use loader::{FftGridChoice, WavefunctionLoader, OCCUPATION_THRESHOLD};
pub use model::{ModelLoader, ModelOrbital, OrbitalShape};
pub use wavefunction::{MemoryMode, Spin, Wavefunction};
