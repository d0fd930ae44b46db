//! Three-dimensional FFT on a fixed grid
//!
//! The forward transform is normalised by `1/N`, the backward transform is
//! not, so that `backward(forward(f)) == f` and the forward transform of a
//! density normalised to one electron has `rho(G=0) = 1/omega`.

use ndarray::{Array3, Axis};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Integer frequency of grid index `i` on an axis of length `n`.
///
/// Follows the usual `fftfreq` ordering: `0, 1, ..., -2, -1`.
pub fn fftfreq(i: usize, n: usize) -> i32 {
    if i < (n + 1) / 2 {
        i as i32
    } else {
        i as i32 - n as i32
    }
}

/// Grid index holding frequency `m` on an axis of length `n`.
pub fn freq_index(m: i32, n: usize) -> usize {
    m.rem_euclid(n as i32) as usize
}

#[derive(Clone)]
pub struct FourierTransform {
    n1: usize,
    n2: usize,
    n3: usize,
    fwd: [Arc<dyn Fft<f64>>; 3],
    bwd: [Arc<dyn Fft<f64>>; 3],
}

impl FourierTransform {
    pub fn new(n1: usize, n2: usize, n3: usize) -> FourierTransform {
        let mut planner = FftPlanner::<f64>::new();
        let fwd = [
            planner.plan_fft_forward(n1),
            planner.plan_fft_forward(n2),
            planner.plan_fft_forward(n3),
        ];
        let bwd = [
            planner.plan_fft_inverse(n1),
            planner.plan_fft_inverse(n2),
            planner.plan_fft_inverse(n3),
        ];

        FourierTransform {
            n1,
            n2,
            n3,
            fwd,
            bwd,
        }
    }

    pub fn n1(&self) -> usize {
        self.n1
    }

    pub fn n2(&self) -> usize {
        self.n2
    }

    pub fn n3(&self) -> usize {
        self.n3
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.n1, self.n2, self.n3]
    }

    pub fn ntot(&self) -> usize {
        self.n1 * self.n2 * self.n3
    }

    /// Integer frequencies of grid point `(i1, i2, i3)`.
    pub fn freq(&self, i1: usize, i2: usize, i3: usize) -> [i32; 3] {
        [
            fftfreq(i1, self.n1),
            fftfreq(i2, self.n2),
            fftfreq(i3, self.n3),
        ]
    }

    /// Whether `arr` lives on this grid.
    pub fn matches(&self, arr: &Array3<Complex64>) -> bool {
        arr.dim() == (self.n1, self.n2, self.n3)
    }

    /// `f(G) = 1/N sum_r f(r) exp(-i G r)`
    pub fn forward(&self, arr: &Array3<Complex64>) -> Array3<Complex64> {
        let mut out = arr.to_owned();
        self.forward_inplace(&mut out);
        out
    }

    /// `f(r) = sum_G f(G) exp(i G r)`
    pub fn backward(&self, arr: &Array3<Complex64>) -> Array3<Complex64> {
        let mut out = arr.to_owned();
        self.backward_inplace(&mut out);
        out
    }

    pub fn forward_inplace(&self, arr: &mut Array3<Complex64>) {
        for axis in 0..3 {
            transform_axis(arr, axis, &self.fwd[axis]);
        }
        let scale = 1.0 / self.ntot() as f64;
        arr.mapv_inplace(|v| v * scale);
    }

    pub fn backward_inplace(&self, arr: &mut Array3<Complex64>) {
        for axis in 0..3 {
            transform_axis(arr, axis, &self.bwd[axis]);
        }
    }
}

fn transform_axis(arr: &mut Array3<Complex64>, axis: usize, fft: &Arc<dyn Fft<f64>>) {
    let n = arr.len_of(Axis(axis));
    let mut scratch = vec![Complex64::new(0.0, 0.0); n];
    for mut lane in arr.lanes_mut(Axis(axis)) {
        for (s, v) in scratch.iter_mut().zip(lane.iter()) {
            *s = *v;
        }
        fft.process(&mut scratch);
        for (v, s) in lane.iter_mut().zip(scratch.iter()) {
            *v = *s;
        }
    }
}

impl fmt::Debug for FourierTransform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FourierTransform")
            .field("n1", &self.n1)
            .field("n2", &self.n2)
            .field("n3", &self.n3)
            .finish()
    }
}

impl fmt::Display for FourierTransform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} x {} x {}", self.n1, self.n2, self.n3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_fftfreq_ordering() {
        let even: Vec<i32> = (0..4).map(|i| fftfreq(i, 4)).collect();
        assert_eq!(even, vec![0, 1, -2, -1]);
        let odd: Vec<i32> = (0..5).map(|i| fftfreq(i, 5)).collect();
        assert_eq!(odd, vec![0, 1, 2, -2, -1]);
        assert_eq!(freq_index(-1, 5), 4);
        assert_eq!(freq_index(2, 5), 2);
    }

    #[test]
    fn test_plane_wave_maps_to_single_coefficient() {
        let ft = FourierTransform::new(6, 5, 4);
        let m = [1, -2, 1];
        let arr = Array3::from_shape_fn((6, 5, 4), |(i, j, k)| {
            let phase = 2.0
                * PI
                * (m[0] as f64 * i as f64 / 6.0
                    + m[1] as f64 * j as f64 / 5.0
                    + m[2] as f64 * k as f64 / 4.0);
            Complex64::new(phase.cos(), phase.sin())
        });

        let g = ft.forward(&arr);
        for ((i, j, k), v) in g.indexed_iter() {
            let expected = if ft.freq(i, j, k) == m { 1.0 } else { 0.0 };
            assert_relative_eq!(v.re, expected, epsilon = 1e-12);
            assert_relative_eq!(v.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_backward_inverts_forward() {
        let ft = FourierTransform::new(4, 3, 5);
        let arr = Array3::from_shape_fn((4, 3, 5), |(i, j, k)| {
            Complex64::new((i * 7 + j * 3 + k) as f64 * 0.1, (i + 2 * k) as f64 * -0.05)
        });
        let back = ft.backward(&ft.forward(&arr));
        for (a, b) in arr.iter().zip(back.iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_constant_has_only_zero_frequency() {
        let ft = FourierTransform::new(3, 3, 3);
        let arr = Array3::from_elem((3, 3, 3), Complex64::new(2.0, 0.0));
        let g = ft.forward(&arr);
        assert_relative_eq!(g[[0, 0, 0]].re, 2.0, epsilon = 1e-12);
        let rest: f64 = g.iter().skip(1).map(|v| v.norm()).sum();
        assert!(rest < 1e-12);
    }
}
