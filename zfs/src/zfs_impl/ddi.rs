//! Dipole-dipole interaction kernel in reciprocal space

use ndarray::parallel::prelude::*;
use ndarray::{Array4, Axis};
use std::f64::consts::PI;
use wfc::{Cell, FourierTransform};

/// Cartesian index pairs of the six stored components.
pub const COMPONENTS: [(usize, usize); 6] = [(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)];

/// Upper-triangular part of the dipole-dipole tensor on the FFT grid,
///
/// ddig_ab(G) = 4 pi / omega (G_a G_b / |G|^2 - delta_ab / 3),
///
/// with components ordered `xx, xy, xz, yy, yz, zz`. The `G = 0` term is set
/// to zero.
///
/// # Returns
///
/// Array of shape `(6, n1, n2, n3)`.
pub fn compute_ddig(cell: &Cell, ft: &FourierTransform) -> Array4<f64> {
    let [n1, n2, n3] = ft.shape();
    let fac = 4.0 * PI / cell.omega();
    let mut ddig = Array4::<f64>::zeros((6, n1, n2, n3));

    ddig.axis_iter_mut(Axis(1))
        .into_par_iter()
        .enumerate()
        .for_each(|(i1, mut plane)| {
            for i2 in 0..n2 {
                for i3 in 0..n3 {
                    let m = ft.freq(i1, i2, i3);
                    if m == [0, 0, 0] {
                        continue;
                    }
                    let g = cell.gvector(m);
                    let g2 = g.norm_squared();
                    for (c, &(a, b)) in COMPONENTS.iter().enumerate() {
                        let delta = if a == b { 1.0 / 3.0 } else { 0.0 };
                        plane[[c, i2, i3]] = fac * (g[a] * g[b] / g2 - delta);
                    }
                }
            }
        });

    ddig
}
