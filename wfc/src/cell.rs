//! Periodic simulation cell

extern crate nalgebra as na;

use crate::error::WfcError;
use crate::units::ANGSTROM_TO_BOHR;
use na::{Matrix3, Vector3};
use std::f64::consts::PI;
use std::fmt;

/// Lattice vectors, reciprocal vectors and volume of a periodic cell.
///
/// All lengths are in bohr. Rows of `lattice` are `a1, a2, a3`; rows of
/// `reciprocal` are `b1, b2, b3` with `a_i . b_j = 2 pi delta_ij`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    lattice: Matrix3<f64>,
    reciprocal: Matrix3<f64>,
    omega: f64,
}

impl Cell {
    /// Build a cell from three lattice vectors given in bohr.
    ///
    /// Fails if the vectors are degenerate or left-handed.
    pub fn new(a1: [f64; 3], a2: [f64; 3], a3: [f64; 3]) -> Result<Self, WfcError> {
        let a1 = Vector3::from(a1);
        let a2 = Vector3::from(a2);
        let a3 = Vector3::from(a3);

        // ( a2 x a3 ) . a1
        let omega = a1.dot(&a2.cross(&a3));
        if !omega.is_finite() || omega <= 1e-12 {
            return Err(WfcError::InvalidCell(format!(
                "lattice vectors span a non-positive volume ({:.6e} bohr^3)",
                omega
            )));
        }

        let factor = 2.0 * PI / omega;
        let b1 = a2.cross(&a3) * factor;
        let b2 = a3.cross(&a1) * factor;
        let b3 = a1.cross(&a2) * factor;

        Ok(Cell {
            lattice: Matrix3::from_rows(&[a1.transpose(), a2.transpose(), a3.transpose()]),
            reciprocal: Matrix3::from_rows(&[b1.transpose(), b2.transpose(), b3.transpose()]),
            omega,
        })
    }

    /// Build a cell from lattice vectors given in angstrom.
    pub fn from_angstrom(a1: [f64; 3], a2: [f64; 3], a3: [f64; 3]) -> Result<Self, WfcError> {
        let scale = |v: [f64; 3]| v.map(|x| x * ANGSTROM_TO_BOHR);
        Self::new(scale(a1), scale(a2), scale(a3))
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }

    pub fn lattice(&self) -> &Matrix3<f64> {
        &self.lattice
    }

    pub fn reciprocal(&self) -> &Matrix3<f64> {
        &self.reciprocal
    }

    /// Lattice vector `a_{i+1}`.
    pub fn a(&self, i: usize) -> Vector3<f64> {
        self.lattice.row(i).transpose()
    }

    /// Reciprocal lattice vector `b_{i+1}`.
    pub fn b(&self, i: usize) -> Vector3<f64> {
        self.reciprocal.row(i).transpose()
    }

    /// Cartesian G vector for integer frequencies `m = (m1, m2, m3)`.
    pub fn gvector(&self, m: [i32; 3]) -> Vector3<f64> {
        self.b(0) * m[0] as f64 + self.b(1) * m[1] as f64 + self.b(2) * m[2] as f64
    }

    /// Cartesian position of fractional coordinates `f`.
    pub fn frac_to_cart(&self, f: [f64; 3]) -> Vector3<f64> {
        self.a(0) * f[0] + self.a(1) * f[1] + self.a(2) * f[2]
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Cell (bohr), volume = {:.6}", self.omega)?;
        for i in 0..3 {
            let a = self.a(i);
            writeln!(f, "  a{} = [{:14.8} {:14.8} {:14.8}]", i + 1, a.x, a.y, a.z)?;
        }
        for i in 0..3 {
            let b = self.b(i);
            write!(f, "  b{} = [{:14.8} {:14.8} {:14.8}]", i + 1, b.x, b.y, b.z)?;
            if i < 2 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
