// src/data_analysis/heatmap.rs

//! Throttle-binned heatmaps: per-window rows (spectra or step responses)
//! accumulated against each window's throttle.

use ndarray::{Array1, Array2, Axis, Zip};

use crate::constants::{HEATMAP_FREQ_BIN_DIVISOR, THROTTLE_RANGE};
use crate::data_analysis::interpolation::linspace;
use crate::data_analysis::mode_average::value_bucket;
use crate::data_analysis::smoothing::{gaussian_filter_axis, BoundaryMode};
use crate::data_analysis::spectrum::SpectrumResult;
use crate::error::{check_len, AnalysisError, Result};

// Keeps empty throttle bins at zero instead of dividing by zero.
const COUNT_EPSILON: f64 = 1e-9;

/// Weighted throttle × y histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleHeatmap {
    pub throttle_edges: Array1<f64>,
    pub y_edges: Array1<f64>,
    /// throttle bins × y bins, absolute accumulated weight
    pub weights: Array2<f64>,
    /// Windows per throttle bin
    pub counts: Array1<f64>,
    /// `weights` divided by the throttle-bin window count
    pub normalized: Array2<f64>,
}

impl ThrottleHeatmap {
    pub fn throttle_bins(&self) -> usize {
        self.weights.nrows()
    }

    pub fn y_bins(&self) -> usize {
        self.weights.ncols()
    }
}

/// Accumulates `weights[i, j]` at (`throttle[i]`, `y_axis[j]`) over throttle
/// [0, 100] and `[y_axis[0], y_axis[last]]`. Throttle values outside the
/// range (or non-finite cells) are skipped.
pub fn throttle_histogram(
    throttle: &Array1<f64>,
    y_axis: &Array1<f64>,
    weights: &Array2<f64>,
    throttle_bins: usize,
    y_bins: usize,
) -> Result<ThrottleHeatmap> {
    check_len("heatmap throttle", weights.nrows(), throttle.len())?;
    check_len("heatmap y axis", weights.ncols(), y_axis.len())?;
    if throttle_bins == 0 || y_bins == 0 {
        return Err(AnalysisError::InvalidConfig("heatmap bin counts must be > 0".into()));
    }
    let (y_lo, y_hi) = match (y_axis.first(), y_axis.last()) {
        (Some(&lo), Some(&hi)) if lo.is_finite() && hi.is_finite() && lo < hi => (lo, hi),
        _ => {
            return Err(AnalysisError::InsufficientData(format!(
                "heatmap y axis of {} samples has no increasing range",
                y_axis.len()
            )))
        }
    };

    let throttle_edges = linspace(THROTTLE_RANGE[0], THROTTLE_RANGE[1], throttle_bins + 1);
    let y_edges = linspace(y_lo, y_hi, y_bins + 1);
    let y_index: Vec<Option<usize>> = y_axis.iter().map(|&y| value_bucket(y, &y_edges)).collect();

    let mut accumulated = Array2::<f64>::zeros((throttle_bins, y_bins));
    let mut counts = Array1::<f64>::zeros(throttle_bins);
    for (row, &thr) in weights.rows().into_iter().zip(throttle.iter()) {
        let Some(t) = value_bucket(thr, &throttle_edges) else {
            continue;
        };
        counts[t] += 1.0;
        for (&w, y) in row.iter().zip(y_index.iter()) {
            if let (Some(y), true) = (y, w.is_finite()) {
                accumulated[[t, *y]] += w;
            }
        }
    }

    let weights = accumulated.mapv(f64::abs);
    let mut normalized = weights.clone();
    for (mut row, &count) in normalized.axis_iter_mut(Axis(0)).zip(counts.iter()) {
        row.mapv_inplace(|v| v / (count + COUNT_EPSILON));
    }
    Ok(ThrottleHeatmap {
        throttle_edges,
        y_edges,
        weights,
        counts,
        normalized,
    })
}

/// Noise heatmap: window spectra against max throttle, `len(freq) / 4`
/// frequency bins, normalized per throttle bin and smoothed along throttle.
pub fn noise_heatmap(
    max_throttle: &Array1<f64>,
    spectrum: &SpectrumResult,
    throttle_bins: usize,
    sigma: f64,
) -> Result<ThrottleHeatmap> {
    let y_bins = (spectrum.frequencies.len() / HEATMAP_FREQ_BIN_DIVISOR).max(1);
    let mut heatmap = throttle_histogram(max_throttle, &spectrum.frequencies, &spectrum.magnitude, throttle_bins, y_bins)?;
    heatmap.normalized = gaussian_filter_axis(&heatmap.normalized, sigma, Axis(0), BoundaryMode::Constant);
    Ok(heatmap)
}

/// Step responses of moving windows against max throttle. Windows outside
/// `mask` are moved to throttle -1 so they fall out of range.
pub fn response_heatmap(
    max_throttle: &Array1<f64>,
    mask: &Array1<f64>,
    time: &Array1<f64>,
    step_response: &Array2<f64>,
    throttle_bins: usize,
) -> Result<ThrottleHeatmap> {
    check_len("response heatmap mask", max_throttle.len(), mask.len())?;
    check_len("response heatmap rows", step_response.nrows(), mask.len())?;
    let signed_throttle = Zip::from(max_throttle)
        .and(mask)
        .map_collect(|&thr, &m| if m > 0.0 { thr } else { -1.0 });
    let weighted = step_response * &mask.view().insert_axis(Axis(1));
    throttle_histogram(&signed_throttle, time, &weighted, throttle_bins, time.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_histogram_bins_and_normalizes() {
        let throttle = array![10.2, 10.4, 55.0, 140.0];
        let y = array![0.0, 1.0, 2.0, 3.0];
        let weights = Array2::from_elem((4, 4), 2.0);
        let map = throttle_histogram(&throttle, &y, &weights, 101, 4).unwrap();
        assert_eq!(map.throttle_bins(), 101);
        assert_eq!(map.y_bins(), 4);
        // Bin width 100/101: 10.2 and 10.4 share bin 10.
        assert_eq!(map.counts[10], 2.0);
        assert_eq!(map.counts[55], 1.0);
        assert_eq!(map.counts.sum(), 3.0);
        assert_eq!(map.weights.row(10).sum(), 16.0);
        assert_abs_diff_eq!(map.normalized[[10, 0]], 2.0, epsilon = 1e-8);
        assert_eq!(map.normalized[[0, 0]], 0.0);
    }

    #[test]
    fn test_noise_heatmap_smooths_along_throttle() {
        let spectrum = SpectrumResult {
            frequencies: Array1::from_shape_fn(9, |i| i as f64 * 10.0),
            magnitude: Array2::from_elem((1, 9), 1.0),
        };
        let map = noise_heatmap(&array![50.0], &spectrum, 101, 3.0).unwrap();
        assert_eq!(map.y_bins(), 2);
        let column: f64 = map.normalized.column(0).sum();
        let raw = map.weights[[50, 0]];
        assert!(map.normalized[[50, 0]] < raw);
        assert!(map.normalized[[47, 0]] > 0.0);
        assert_abs_diff_eq!(column, raw, epsilon = 1e-6);
    }

    #[test]
    fn test_response_heatmap_drops_masked_windows() {
        let time = array![0.0, 0.001, 0.002];
        let responses = array![[0.5, 1.0, 1.0], [0.2, 0.4, 0.6]];
        let map = response_heatmap(&array![30.0, 60.0], &array![1.0, 0.0], &time, &responses, 101).unwrap();
        assert_eq!(map.counts.sum(), 1.0);
        assert_eq!(map.weights.row(30).sum(), 2.5);
        assert!(map.weights.row(60).iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_response_heatmap_skips_masked_zero_throttle() {
        let time = array![0.0, 0.001];
        let responses = array![[0.5, 1.0], [0.3, 0.9]];
        let map = response_heatmap(&array![30.0, 0.0], &array![1.0, 0.0], &time, &responses, 101).unwrap();
        assert_eq!(map.counts.sum(), 1.0);
        assert_eq!(map.counts[0], 0.0);
        assert_abs_diff_eq!(map.normalized[[30, 0]], 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_bad_inputs() {
        let w = Array2::zeros((2, 3));
        assert!(throttle_histogram(&array![1.0], &array![0.0, 1.0, 2.0], &w, 10, 3).is_err());
        assert!(throttle_histogram(&array![1.0, 2.0], &array![1.0, 1.0, 1.0], &w, 10, 3).is_err());
        assert!(throttle_histogram(&array![1.0, 2.0], &array![0.0, 1.0, 2.0], &w, 0, 3).is_err());
    }
}

// src/data_analysis/heatmap.rs
