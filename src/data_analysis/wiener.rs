// src/data_analysis/wiener.rs

//! Regularized frequency-domain (Wiener) deconvolution of stacked windows.
//!
//! For an input spectrum `H` and output spectrum `G` the per-window
//! estimate is `G·conj(H) / (H·conj(H) + 1/sn)`, i.e. the transfer function
//! output/input with a frequency-dependent regularization `1/sn` that is
//! small below the cut frequency and very large above it.

use ndarray::{s, Array1, Array2, ArrayView1};
use rayon::prelude::*;

use crate::constants::{WIENER_CUT_EPSILON, WIENER_PASSBAND_SN, WIENER_SN_FLOOR};
use crate::data_analysis::fft_utils::{fftfreq, next_power_of_two, FftPlan};
use crate::data_analysis::smoothing::{gaussian_filter1d, normalize_to_mask, BoundaryMode};
use crate::data_analysis::window_functions::tukeywin;
use crate::error::{AnalysisError, Result};

/// Regularization term `1/sn` for an `n`-point FFT with sample spacing `dt`.
///
/// `sn` starts as a hard step at `cut_freq` (0 below, 1 above), is blurred
/// with a Gaussian whose width is a sixth of the pass-band bin count, and is
/// then mapped to `10·(1 − sn + 1e-9)`: 10 in the pass band and 1e-8 far
/// above the cut.
pub fn regularization_curve(n: usize, dt: f64, cut_freq: f64) -> Array1<f64> {
    let freq = fftfreq(n, dt);
    let step = freq.mapv(|f| f.abs().max(cut_freq - WIENER_CUT_EPSILON).min(cut_freq));
    let mask = normalize_to_mask(&step);
    let passband_bins: f64 = mask.iter().map(|m| 1.0 - m).sum();
    let blurred = normalize_to_mask(&gaussian_filter1d(&mask, passband_bins / 6.0, BoundaryMode::Reflect));
    blurred.mapv(|m| 1.0 / (WIENER_PASSBAND_SN * (1.0 - m + WIENER_SN_FLOOR)))
}

/// Deconvolved windows, one real row per input window.
#[derive(Debug, Clone, PartialEq)]
pub struct WienerResult {
    pub data: Array2<f64>,
}

impl WienerResult {
    pub fn row_count(&self) -> usize {
        self.data.nrows()
    }

    pub fn column_count(&self) -> usize {
        self.data.ncols()
    }
}

/// Deconvolution engine for a fixed sampling interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WienerDeconvolution {
    dt: f64,
    taper_alpha: f64,
}

impl WienerDeconvolution {
    /// `taper_alpha` is the Tukey alpha of the edge taper applied to both
    /// rows before transforming.
    pub fn new(dt: f64, taper_alpha: f64) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!("sampling interval must be positive, got {}", dt)));
        }
        Ok(Self { dt, taper_alpha })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Deconvolves every row of `output` by the matching row of `input`.
    /// Rows are processed in parallel; the result does not depend on order.
    pub fn deconvolve(&self, input: &Array2<f64>, output: &Array2<f64>, cut_freq: f64) -> Result<WienerResult> {
        if input.dim() != output.dim() {
            return Err(AnalysisError::ShapeMismatch {
                context: "wiener deconvolution",
                expected: input.dim(),
                actual: output.dim(),
            });
        }
        if !(cut_freq.is_finite() && cut_freq > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!("cut frequency must be positive, got {}", cut_freq)));
        }

        let (rows, len) = input.dim();
        if rows == 0 || len == 0 {
            return Ok(WienerResult {
                data: Array2::zeros((rows, len)),
            });
        }

        let n_fft = next_power_of_two(len);
        let plan = FftPlan::new(n_fft)?;
        let taper = tukeywin(len, self.taper_alpha);
        let regularization = regularization_curve(n_fft, self.dt, cut_freq);
        tracing::debug!(
            "Deconvolving {} windows of {} samples (FFT size {}, cut {} Hz)",
            rows,
            len,
            n_fft,
            cut_freq
        );

        let deconvolved = (0..rows)
            .into_par_iter()
            .map(|i| deconvolve_row(&plan, &taper, &regularization, input.row(i), output.row(i)))
            .collect::<Result<Vec<Array1<f64>>>>()?;

        let mut data = Array2::zeros((rows, len));
        for (mut dst, row) in data.rows_mut().into_iter().zip(deconvolved.iter()) {
            dst.assign(row);
        }
        Ok(WienerResult { data })
    }
}

fn deconvolve_row(
    plan: &FftPlan,
    taper: &Array1<f64>,
    regularization: &Array1<f64>,
    input: ArrayView1<f64>,
    output: ArrayView1<f64>,
) -> Result<Array1<f64>> {
    let len = input.len();
    let tapered_input = (&input * taper).to_vec();
    let tapered_output = (&output * taper).to_vec();

    let h = plan.forward(&tapered_input, None)?;
    let g = plan.forward(&tapered_output, None)?;
    let h_conj = h.conj();

    let numerator = g.multiply(&h_conj)?;
    let power = h.multiply(&h_conj)?;
    let denominator = &power.re + regularization;
    let estimate = numerator.divide(&denominator, None)?;

    let impulse = plan.inverse(&estimate)?;
    Ok(impulse.re.slice(s![..len]).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_regularization_two_levels() {
        let n = 1024;
        let dt = 0.001;
        let reg = regularization_curve(n, dt, 25.0);
        assert_eq!(reg.len(), n);
        assert_relative_eq!(reg[0], 0.1, max_relative = 1e-6);
        assert_relative_eq!(reg[n / 2], 1e8, max_relative = 1e-6);
        let freq = fftfreq(n, dt);
        for (f, r) in freq.iter().zip(reg.iter()) {
            if f.abs() <= 10.0 {
                assert!(*r < 0.2, "{} Hz -> {}", f, r);
            } else if f.abs() >= 100.0 {
                assert!(*r > 1e6, "{} Hz -> {}", f, r);
            }
        }
        // Non-decreasing from DC up to Nyquist.
        for k in 1..=n / 2 {
            assert!(reg[k] >= reg[k - 1] * (1.0 - 1e-9));
        }
    }

    #[test]
    fn test_regularization_cut_above_nyquist() {
        let reg = regularization_curve(64, 0.001, 5000.0);
        for v in reg.iter() {
            assert_relative_eq!(*v, 0.1, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_all_zero_windows_give_zero() {
        let engine = WienerDeconvolution::new(0.001, 0.5).unwrap();
        let zeros = Array2::<f64>::zeros((4, 100));
        let result = engine.deconvolve(&zeros, &zeros, 25.0).unwrap();
        assert_eq!(result.row_count(), 4);
        assert_eq!(result.column_count(), 100);
        assert!(result.data.iter().all(|v| v.is_finite() && *v == 0.0));
    }

    #[test]
    fn test_identity_system_recovers_impulse() {
        // output == input: the estimate is an impulse at lag 0 (blurred by
        // the low-pass regularization).
        let n = 256;
        let input = Array2::from_shape_fn((1, n), |(_, j)| ((j * 7919) % 97) as f64 + 100.0);
        let engine = WienerDeconvolution::new(0.001, 0.5).unwrap();
        let result = engine.deconvolve(&input, &input, 400.0).unwrap();
        let row = result.data.row(0);
        let sum: f64 = row.iter().take(20).sum::<f64>() + row.iter().rev().take(20).sum::<f64>();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 0.05);
        assert!(row[0] > 0.5);
    }

    #[test]
    fn test_shape_and_config_errors() {
        let engine = WienerDeconvolution::new(0.001, 0.5).unwrap();
        let a = Array2::<f64>::zeros((2, 8));
        let b = Array2::<f64>::zeros((3, 8));
        assert!(matches!(engine.deconvolve(&a, &b, 25.0), Err(AnalysisError::ShapeMismatch { .. })));
        assert!(matches!(engine.deconvolve(&a, &a, 0.0), Err(AnalysisError::InvalidConfig(_))));
        assert!(WienerDeconvolution::new(0.0, 0.5).is_err());
    }

    #[test]
    fn test_empty_set() {
        let engine = WienerDeconvolution::new(0.001, 0.5).unwrap();
        let empty = Array2::<f64>::zeros((0, 32));
        let result = engine.deconvolve(&empty, &empty, 25.0).unwrap();
        assert_eq!(result.row_count(), 0);
        assert_eq!(result.column_count(), 32);
    }
}

// src/data_analysis/wiener.rs
