// src/data_analysis/mode_average.rs

//! Representative step-response curve from many noisy per-window responses.
//!
//! Every (window, sample) cell adds its window weight to a 2-D histogram
//! of time column × response value bucket. One value per time column is
//! then read back out of the histogram.

use ndarray::{Array1, Array2, Zip};

use crate::config::ModeEstimator;
use crate::constants::MODE_BAND_THRESHOLD;
use crate::data_analysis::interpolation::linspace;
use crate::data_analysis::smoothing::{gaussian_filter1d, BoundaryMode};
use crate::error::{check_len, AnalysisError, Result};

/// Weighted histogram of response values per time column.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2D {
    /// time columns × value buckets
    pub weights: Array2<f64>,
    /// `value_bins + 1` uniform bucket edges over the value range
    pub value_edges: Array1<f64>,
    /// Weight of cells that fell outside the value range or were not finite
    pub dropped_weight: f64,
}

/// Bucket index of `v` for uniform `edges`, or `None` when `v` is outside
/// `[edges[0], edges[bins]]`. The last bucket includes its right edge.
pub fn value_bucket(v: f64, edges: &Array1<f64>) -> Option<usize> {
    let bins = edges.len().checked_sub(1)?;
    if bins == 0 || !v.is_finite() {
        return None;
    }
    let (lo, hi) = (edges[0], edges[bins]);
    if v < lo || v > hi {
        return None;
    }
    let mut index = (((v - lo) * bins as f64 / (hi - lo)) as usize).min(bins - 1);
    // Float rounding can land one bucket off; settle against the edges.
    if index > 0 && v < edges[index] {
        index -= 1;
    } else if index < bins - 1 && v >= edges[index + 1] {
        index += 1;
    }
    Some(index)
}

fn check_range(vert_range: [f64; 2], vert_bins: usize) -> Result<()> {
    if vert_bins == 0 {
        return Err(AnalysisError::InvalidConfig("histogram needs at least one value bin".into()));
    }
    let [lo, hi] = vert_range;
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(AnalysisError::InvalidConfig(format!("invalid histogram range [{}, {}]", lo, hi)));
    }
    Ok(())
}

fn check_weights(mask: &Array1<f64>) -> Result<()> {
    match mask.iter().position(|w| !(w.is_finite() && *w >= 0.0)) {
        Some(index) => Err(AnalysisError::InvalidWeight {
            index,
            value: mask[index],
        }),
        None => Ok(()),
    }
}

impl Histogram2D {
    /// Bins every row of `responses` (windows × samples) with its weight from `mask`.
    pub fn build(responses: &Array2<f64>, mask: &Array1<f64>, vert_range: [f64; 2], vert_bins: usize) -> Result<Self> {
        check_len("histogram mask", responses.nrows(), mask.len())?;
        check_range(vert_range, vert_bins)?;
        check_weights(mask)?;

        let value_edges = linspace(vert_range[0], vert_range[1], vert_bins + 1);
        let mut weights = Array2::<f64>::zeros((responses.ncols(), vert_bins));
        let mut dropped_weight = 0.0;
        for (row, &w) in responses.rows().into_iter().zip(mask.iter()) {
            if w == 0.0 {
                continue;
            }
            for (t, &v) in row.iter().enumerate() {
                match value_bucket(v, &value_edges) {
                    Some(b) => weights[[t, b]] += w,
                    None => dropped_weight += w,
                }
            }
        }
        if dropped_weight > 0.0 {
            tracing::debug!("Histogram dropped weight {} outside {:?}", dropped_weight, vert_range);
        }
        Ok(Self {
            weights,
            value_edges,
            dropped_weight,
        })
    }

    pub fn time_bins(&self) -> usize {
        self.weights.nrows()
    }

    pub fn value_bins(&self) -> usize {
        self.weights.ncols()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.sum()
    }

    /// Midpoint of each value bucket.
    pub fn bucket_centers(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.value_bins(), |i| 0.5 * (self.value_edges[i] + self.value_edges[i + 1]))
    }
}

/// Representative curve with its error band.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeAverage {
    /// Seconds from window start
    pub time: Array1<f64>,
    pub values: Array1<f64>,
    /// Half-width of the populated value span per column
    pub band: Array1<f64>,
    /// Columns that received no weight (value 0.0)
    pub empty_columns: usize,
}

/// Bucket with the largest weight (first one on ties), `None` for an empty column.
fn peak_bucket(column: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &w) in column.iter().enumerate() {
        if w > 0.0 && best.map_or(true, |(_, bw)| w > bw) {
            best = Some((i, w));
        }
    }
    best.map(|(i, _)| i)
}

/// Smoothed column scaled to a peak of 1, averaged over `positions` with squared weights.
fn smoothed_average(column: &Array1<f64>, positions: &Array1<f64>, sigma: f64) -> f64 {
    let smoothed = gaussian_filter1d(column, sigma, BoundaryMode::Constant);
    let peak = smoothed.iter().copied().fold(0.0, f64::max);
    if peak <= 0.0 {
        return 0.0;
    }
    let (num, den) = smoothed
        .iter()
        .zip(positions.iter())
        .fold((0.0, 0.0), |(num, den), (&w, &p)| {
            let w2 = (w / peak).powi(2);
            (num + p * w2, den + w2)
        });
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Extracts one representative value per time column of `responses`.
///
/// Windows with zero weight in `mask` contribute nothing. A column with no
/// weight at all yields 0.0 and a zero band.
pub fn weighted_mode_average(
    responses: &Array2<f64>,
    mask: &Array1<f64>,
    vert_range: [f64; 2],
    vert_bins: usize,
    sample_rate: f64,
    estimator: ModeEstimator,
) -> Result<ModeAverage> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(AnalysisError::InvalidConfig(format!("sample rate must be positive, got {}", sample_rate)));
    }
    let histogram = Histogram2D::build(responses, mask, vert_range, vert_bins)?;

    let columns = histogram.time_bins();
    let time = Array1::from_shape_fn(columns, |i| i as f64 / sample_rate);
    let centers = histogram.bucket_centers();
    let positions = linspace(vert_range[0], vert_range[1], vert_bins);
    let band_unit = 0.5 * (vert_range[1] - vert_range[0]) / vert_bins as f64;

    let mut values = Array1::<f64>::zeros(columns);
    let mut band = Array1::<f64>::zeros(columns);
    Zip::from(&mut values)
        .and(&mut band)
        .and(histogram.weights.rows())
        .par_for_each(|value, band, column| {
            let populated = column.iter().filter(|&&w| w > MODE_BAND_THRESHOLD).count();
            *band = populated as f64 * band_unit;
            *value = match estimator {
                ModeEstimator::Peak => column
                    .as_slice()
                    .and_then(peak_bucket)
                    .map_or(0.0, |b| centers[b]),
                ModeEstimator::Smoothed { sigma } => smoothed_average(&column.to_owned(), &positions, sigma),
            };
        });

    let empty_columns = histogram
        .weights
        .rows()
        .into_iter()
        .filter(|column| column.iter().all(|&w| w == 0.0))
        .count();
    if columns > 0 && empty_columns == columns {
        tracing::warn!("No windows contributed to the response histogram");
    } else if empty_columns > 0 {
        tracing::warn!("{} of {} response histogram columns are empty", empty_columns, columns);
    }

    Ok(ModeAverage {
        time,
        values,
        band,
        empty_columns,
    })
}

/// Variant weighting every window equally. `max_input` only fixes the
/// expected window count.
pub fn weighted_mode_average_unmasked(
    responses: &Array2<f64>,
    max_input: &Array1<f64>,
    vert_range: [f64; 2],
    vert_bins: usize,
    sample_rate: f64,
    estimator: ModeEstimator,
) -> Result<ModeAverage> {
    check_len("unmasked mode average", responses.nrows(), max_input.len())?;
    let mask = Array1::ones(max_input.len());
    weighted_mode_average(responses, &mask, vert_range, vert_bins, sample_rate, estimator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_value_bucket_edges() {
        let edges = linspace(0.0, 1.0, 11);
        assert_eq!(value_bucket(0.0, &edges), Some(0));
        assert_eq!(value_bucket(0.1, &edges), Some(1));
        assert_eq!(value_bucket(0.0999, &edges), Some(0));
        assert_eq!(value_bucket(0.35, &edges), Some(3));
        assert_eq!(value_bucket(1.0, &edges), Some(9));
        assert_eq!(value_bucket(1.0001, &edges), None);
        assert_eq!(value_bucket(-0.1, &edges), None);
        assert_eq!(value_bucket(f64::NAN, &edges), None);
    }

    #[test]
    fn test_peak_picks_heaviest_bucket_centre() {
        // Three windows of two samples in [0, 1] with 10 buckets.
        let responses = array![[0.12, 0.55], [0.14, 0.95], [0.81, 0.97]];
        let mask = array![1.0, 1.0, 1.0];
        let avr = weighted_mode_average(&responses, &mask, [0.0, 1.0], 10, 1000.0, ModeEstimator::Peak).unwrap();
        assert_abs_diff_eq!(avr.values[0], 0.15, epsilon = 1e-12);
        assert_abs_diff_eq!(avr.values[1], 0.95, epsilon = 1e-12);
        assert_eq!(avr.time, array![0.0, 0.001]);
        assert_eq!(avr.empty_columns, 0);
    }

    #[test]
    fn test_mask_weights_and_ties() {
        let responses = array![[0.12], [0.81], [0.82]];
        // Window 0 outweighs the two windows in bucket 8.
        let avr = weighted_mode_average(&responses, &array![3.0, 1.0, 1.0], [0.0, 1.0], 10, 1.0, ModeEstimator::Peak).unwrap();
        assert_abs_diff_eq!(avr.values[0], 0.15, epsilon = 1e-12);
        // Equal weights: lowest bucket wins.
        let tie = weighted_mode_average(&responses, &array![2.0, 1.0, 1.0], [0.0, 1.0], 10, 1.0, ModeEstimator::Peak).unwrap();
        assert_abs_diff_eq!(tie.values[0], 0.15, epsilon = 1e-12);
        // Masked-out windows contribute nothing.
        let masked = weighted_mode_average(&responses, &array![0.0, 1.0, 1.0], [0.0, 1.0], 10, 1.0, ModeEstimator::Peak).unwrap();
        assert_abs_diff_eq!(masked.values[0], 0.85, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_weight_column_is_zero() {
        let responses = array![[0.5, 9.0], [0.5, 9.0]];
        for estimator in [ModeEstimator::Peak, ModeEstimator::Smoothed { sigma: 7.0 }] {
            let avr = weighted_mode_average(&responses, &array![1.0, 1.0], [0.0, 1.0], 10, 1.0, estimator).unwrap();
            assert_eq!(avr.values[1], 0.0);
            assert_eq!(avr.band[1], 0.0);
            assert_eq!(avr.empty_columns, 1);
        }
        let none = weighted_mode_average(&responses, &array![0.0, 0.0], [0.0, 1.0], 10, 1.0, ModeEstimator::Peak).unwrap();
        assert!(none.values.iter().all(|&v| v == 0.0));
        assert_eq!(none.empty_columns, 2);
    }

    #[test]
    fn test_smoothed_estimator_centres_on_cluster() {
        // Five adjacent buckets around 1.0, values at bucket midpoints.
        let responses = Array2::from_shape_fn((50, 3), |(i, _)| 1.0025 + ((i % 5) as f64 - 2.0) * 0.005);
        let mask = Array1::ones(50);
        let avr = weighted_mode_average(&responses, &mask, [-1.5, 3.5], 1000, 1000.0, ModeEstimator::Smoothed { sigma: 7.0 })
            .unwrap();
        for v in avr.values.iter() {
            assert_abs_diff_eq!(*v, 1.0, epsilon = 0.01);
        }
        // Five populated buckets, each 0.005 wide.
        assert_abs_diff_eq!(avr.band[0], 5.0 * 0.0025, epsilon = 1e-12);
    }

    #[test]
    fn test_unmasked_variant_weights_all_windows() {
        let responses = array![[0.12], [0.81], [0.82]];
        let avr = weighted_mode_average_unmasked(&responses, &array![5.0, 900.0, 1.0], [0.0, 1.0], 10, 1.0, ModeEstimator::Peak)
            .unwrap();
        assert_abs_diff_eq!(avr.values[0], 0.85, epsilon = 1e-12);
        assert!(weighted_mode_average_unmasked(&responses, &array![1.0], [0.0, 1.0], 10, 1.0, ModeEstimator::Peak).is_err());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let responses = array![[0.1], [0.2]];
        let mask = array![1.0, 1.0];
        let peak = ModeEstimator::Peak;
        assert!(matches!(
            weighted_mode_average(&responses, &mask, [0.0, 1.0], 0, 1.0, peak),
            Err(AnalysisError::InvalidConfig(_))
        ));
        assert!(weighted_mode_average(&responses, &mask, [1.0, 0.0], 10, 1.0, peak).is_err());
        assert!(weighted_mode_average(&responses, &array![1.0], [0.0, 1.0], 10, 1.0, peak).is_err());
        assert!(matches!(
            weighted_mode_average(&responses, &array![1.0, -1.0], [0.0, 1.0], 10, 1.0, peak),
            Err(AnalysisError::InvalidWeight { index: 1, .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_histogram_conserves_weight(
            cells in proptest::collection::vec(-3.0f64..5.0, 40),
            weights in proptest::collection::vec(0.0f64..3.0, 8),
        ) {
            let responses = Array2::from_shape_vec((8, 5), cells).unwrap();
            let mask = Array1::from(weights);
            let hist = Histogram2D::build(&responses, &mask, [-1.5, 3.5], 100).unwrap();
            let expected = mask.sum() * 5.0;
            prop_assert!((hist.total_weight() + hist.dropped_weight - expected).abs() <= 1e-9 * expected.max(1.0));
            let in_range: f64 = responses
                .rows()
                .into_iter()
                .zip(mask.iter())
                .map(|(row, &w)| row.iter().filter(|v| (-1.5..=3.5).contains(*v)).count() as f64 * w)
                .sum();
            prop_assert!((hist.total_weight() - in_range).abs() <= 1e-9 * expected.max(1.0));
        }
    }
}

// src/data_analysis/mode_average.rs
