extern crate nalgebra as na;

use super::ddi::COMPONENTS;
use na::{Matrix3, SymmetricEigen};
use ndarray::{Array3, Axis};
use std::cmp::Ordering;

/// Zero-field-splitting tensor and its principal values, in MHz.
#[derive(Debug, Clone, PartialEq)]
pub struct ZfsTensor {
    pub d: Matrix3<f64>,
    /// Eigenvalues ordered by magnitude: `[dy, dx, dz]` with `|dy| <= |dx| <= |dz|`
    pub eigenvalues: [f64; 3],
    /// Eigenvectors as columns, in the order of `eigenvalues`
    pub eigenvectors: Matrix3<f64>,
    pub d_value: f64,
    pub e_value: f64,
}

impl ZfsTensor {
    /// Sum the pair matrix over both orbital indices and diagonalize.
    ///
    /// # Arguments
    ///
    /// * `iglobal` - pair contributions of shape `(norbs, norbs, 6)`
    pub fn from_pair_matrix(iglobal: &Array3<f64>) -> Self {
        let summed = iglobal.sum_axis(Axis(0)).sum_axis(Axis(0));
        let mut d = Matrix3::zeros();
        for (c, &(a, b)) in COMPONENTS.iter().enumerate() {
            d[(a, b)] = summed[c];
            d[(b, a)] = summed[c];
        }
        Self::from_matrix(d)
    }

    /// `D = 3/2 dz`, `E = 1/2 (dx - dy)`.
    pub fn from_matrix(d: Matrix3<f64>) -> Self {
        let eigen = SymmetricEigen::new(d);

        let mut order = [0usize, 1, 2];
        order.sort_by(|&i, &j| {
            eigen.eigenvalues[i]
                .abs()
                .partial_cmp(&eigen.eigenvalues[j].abs())
                .unwrap_or(Ordering::Equal)
        });

        let eigenvalues = order.map(|i| eigen.eigenvalues[i]);
        let mut eigenvectors = Matrix3::zeros();
        for (col, &i) in order.iter().enumerate() {
            eigenvectors.set_column(col, &eigen.eigenvectors.column(i));
        }

        let [dy, dx, dz] = eigenvalues;
        ZfsTensor {
            d,
            eigenvalues,
            eigenvectors,
            d_value: 1.5 * dz,
            e_value: 0.5 * (dx - dy),
        }
    }

    pub fn dx(&self) -> f64 {
        self.eigenvalues[1]
    }

    pub fn dy(&self) -> f64 {
        self.eigenvalues[0]
    }

    pub fn dz(&self) -> f64 {
        self.eigenvalues[2]
    }
}
