// src/data_analysis/smoothing.rs

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::constants::GAUSSIAN_TRUNCATE;

/// How samples beyond the array edge are filled while filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryMode {
    /// Mirror about the edge, repeating the edge sample (d c b a | a b c d)
    #[default]
    Reflect,
    /// Zeros outside the array
    Constant,
    /// Repeat the edge sample
    Nearest,
}

impl BoundaryMode {
    /// Maps an out-of-range index to a source index, `None` for zero fill.
    fn source_index(self, idx: isize, len: usize) -> Option<usize> {
        let n = len as isize;
        if (0..n).contains(&idx) {
            return Some(idx as usize);
        }
        match self {
            BoundaryMode::Constant => None,
            BoundaryMode::Nearest => Some(idx.clamp(0, n - 1) as usize),
            BoundaryMode::Reflect => {
                let period = 2 * n;
                let m = idx.rem_euclid(period);
                let mirrored = if m < n { m } else { period - 1 - m };
                Some(mirrored as usize)
            }
        }
    }
}

/// Normalized Gaussian kernel of radius `int(truncate * sigma + 0.5)`.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

fn convolve_lane(data: ArrayView1<f64>, kernel: &[f64], mode: BoundaryMode) -> Array1<f64> {
    let n = data.len();
    let radius = (kernel.len() / 2) as isize;
    Array1::from_shape_fn(n, |i| {
        kernel
            .iter()
            .enumerate()
            .filter_map(|(k, &w)| {
                let idx = i as isize + k as isize - radius;
                mode.source_index(idx, n).map(|src| w * data[src])
            })
            .sum()
    })
}

/// One-dimensional Gaussian filter.
///
/// `sigma <= 0` (or an empty input) returns the data unchanged.
pub fn gaussian_filter1d(data: &Array1<f64>, sigma: f64, mode: BoundaryMode) -> Array1<f64> {
    if sigma <= 0.0 || !sigma.is_finite() || data.is_empty() {
        return data.to_owned();
    }
    let kernel = gaussian_kernel(sigma);
    convolve_lane(data.view(), &kernel, mode)
}

/// Gaussian filter applied along one axis of a matrix.
pub fn gaussian_filter_axis(data: &Array2<f64>, sigma: f64, axis: Axis, mode: BoundaryMode) -> Array2<f64> {
    if sigma <= 0.0 || !sigma.is_finite() || data.is_empty() {
        return data.to_owned();
    }
    let kernel = gaussian_kernel(sigma);
    let mut out = Array2::zeros(data.raw_dim());
    for (src, mut dst) in data.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        dst.assign(&convolve_lane(src, &kernel, mode));
    }
    out
}

/// Shifts data to start at zero and scales it into [0, 1].
/// A constant input maps to all zeros.
pub fn normalize_to_mask(data: &Array1<f64>) -> Array1<f64> {
    if data.is_empty() {
        return data.to_owned();
    }
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let mut shifted = data.mapv(|v| v - min);
    let max = shifted.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max != 0.0 {
        shifted.mapv_inplace(|v| v / max);
    }
    shifted
}

/// Cumulative sum.
pub fn cumsum(data: ArrayView1<f64>) -> Array1<f64> {
    let mut current_sum = 0.0;
    data.iter()
        .map(|&v| {
            current_sum += v;
            current_sum
        })
        .collect()
}

/// First differences with the first sample kept, the inverse of [`cumsum`].
pub fn first_differences(data: ArrayView1<f64>) -> Array1<f64> {
    let mut previous = 0.0;
    data.iter()
        .map(|&v| {
            let d = v - previous;
            previous = v;
            d
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_gaussian_preserves_constant_under_reflect() {
        let data = Array1::from_elem(20, 3.0);
        let out = gaussian_filter1d(&data, 2.5, BoundaryMode::Reflect);
        for v in out.iter() {
            assert_abs_diff_eq!(*v, 3.0, epsilon = 1e-12);
        }
        let nearest = gaussian_filter1d(&data, 2.5, BoundaryMode::Nearest);
        for v in nearest.iter() {
            assert_abs_diff_eq!(*v, 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_gaussian_constant_mode_leaks_at_edges() {
        let data = Array1::from_elem(20, 1.0);
        let out = gaussian_filter1d(&data, 2.0, BoundaryMode::Constant);
        assert!(out[0] < 0.7);
        assert_abs_diff_eq!(out[10], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_gaussian_impulse_conserves_mass() {
        let mut data = Array1::zeros(41);
        data[20] = 1.0;
        let out = gaussian_filter1d(&data, 3.0, BoundaryMode::Constant);
        assert_abs_diff_eq!(out.sum(), 1.0, epsilon = 1e-12);
        assert!(out[20] > out[19] && out[19] > out[18]);
        assert_abs_diff_eq!(out[19], out[21], epsilon = 1e-15);
    }

    #[test]
    fn test_gaussian_zero_sigma_is_identity() {
        let data = array![1.0, 5.0, -2.0];
        assert_eq!(gaussian_filter1d(&data, 0.0, BoundaryMode::Reflect), data);
    }

    #[test]
    fn test_reflect_handles_kernel_longer_than_data() {
        let data = array![1.0, 2.0];
        let out = gaussian_filter1d(&data, 5.0, BoundaryMode::Reflect);
        assert!(out.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(out.sum(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_filter_along_axis_matches_1d() {
        let data = Array2::from_shape_fn((4, 10), |(r, c)| (r * 10 + c) as f64 % 7.0);
        let out = gaussian_filter_axis(&data, 1.5, Axis(1), BoundaryMode::Constant);
        for r in 0..4 {
            let row = gaussian_filter1d(&data.row(r).to_owned(), 1.5, BoundaryMode::Constant);
            for c in 0..10 {
                assert_abs_diff_eq!(out[[r, c]], row[c], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_normalize_to_mask() {
        assert_eq!(normalize_to_mask(&array![2.0, 4.0, 3.0]), array![0.0, 1.0, 0.5]);
        assert_eq!(normalize_to_mask(&array![5.0, 5.0]), array![0.0, 0.0]);
    }

    #[test]
    fn test_cumsum_and_differences() {
        let x = array![1.0, -2.0, 3.5, 0.25];
        let c = cumsum(x.view());
        assert_eq!(c, array![1.0, -1.0, 2.5, 2.75]);
        assert_eq!(first_differences(c.view()), x);
        assert_eq!(cumsum(first_differences(c.view()).view()), c);
    }
}

// src/data_analysis/smoothing.rs
