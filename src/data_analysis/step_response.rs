// src/data_analysis/step_response.rs

//! Per-window step responses and the input-magnitude masks used to pick
//! which windows contribute to a representative curve.

use ndarray::{s, Array1, Array2, Axis, Zip};

use crate::constants::MIN_HIGH_INPUT_WINDOWS;
use crate::data_analysis::smoothing::cumsum;
use crate::data_analysis::stacker::WindowSet;
use crate::data_analysis::wiener::WienerDeconvolution;
use crate::error::{check_len, AnalysisError, Result};

/// Step responses plus per-window summary scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseResult {
    /// N windows × response length
    pub step_response: Array2<f64>,
    pub avg_time: Array1<f64>,
    pub avg_input: Array1<f64>,
    pub max_input: Array1<f64>,
    pub max_throttle: Array1<f64>,
    /// 1.0 for windows whose samples were all finite, 0.0 otherwise
    pub valid: Array1<f64>,
}

impl ResponseResult {
    pub fn window_count(&self) -> usize {
        self.step_response.nrows()
    }

    pub fn response_len(&self) -> usize {
        self.step_response.ncols()
    }
}

/// Disjoint low/high input partition of a window set.
#[derive(Debug, Clone, PartialEq)]
pub struct LowHighMask {
    pub low: Array1<f64>,
    pub high: Array1<f64>,
}

impl LowHighMask {
    pub fn has_high(&self) -> bool {
        self.high.iter().any(|&h| h > 0.0)
    }
}

/// Splits windows at `threshold` on max |input|: low is 1 where
/// `max_input <= threshold`, high is the complement. When fewer than ten
/// windows qualify as high the high mask is all zero.
pub fn low_high_mask(max_input: &Array1<f64>, threshold: f64) -> LowHighMask {
    let low = max_input.mapv(|m| if m <= threshold { 1.0 } else { 0.0 });
    let mut high = low.mapv(|l| 1.0 - l);
    let high_windows = high.iter().filter(|&&h| h > 0.0).count();
    if high_windows < MIN_HIGH_INPUT_WINDOWS {
        if high_windows > 0 {
            tracing::warn!(
                "Only {} windows above {} deg/s (need {}); mask disabled",
                high_windows,
                threshold,
                MIN_HIGH_INPUT_WINDOWS
            );
        }
        high.fill(0.0);
    }
    LowHighMask { low, high }
}

/// Windows with enough stick movement to carry information:
/// the high half of [`low_high_mask`] at `min_input`.
pub fn movement_mask(max_input: &Array1<f64>, min_input: f64) -> Array1<f64> {
    low_high_mask(max_input, min_input).high
}

/// Elementwise product of two window masks.
pub fn combine_masks(a: &Array1<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    check_len("mask combination", a.len(), b.len())?;
    Ok(a * b)
}

fn row_max_abs(matrix: &Array2<f64>) -> Array1<f64> {
    matrix.map_axis(Axis(1), |row| row.iter().fold(0.0, |m: f64, v| m.max(v.abs())))
}

fn row_mean(matrix: &Array2<f64>) -> Array1<f64> {
    matrix.map_axis(Axis(1), |row| row.mean().unwrap_or(0.0))
}

/// Tapers input and gyro windows with `window`, deconvolves them and
/// integrates the first `response_len` samples of each estimate into a
/// step response.
///
/// Windows holding non-finite samples are zeroed before deconvolution and
/// get zero summary scalars.
pub fn stack_response(
    windows: &WindowSet,
    window: &Array1<f64>,
    engine: &WienerDeconvolution,
    cut_freq: f64,
    response_len: usize,
) -> Result<ResponseResult> {
    let len = windows.window_length();
    check_len("step response taper", len, window.len())?;
    if response_len == 0 || response_len > len {
        return Err(AnalysisError::InvalidConfig(format!(
            "response length must be in 1..={}, got {}",
            len, response_len
        )));
    }

    let valid = windows.finite.mapv(|ok| if ok { 1.0 } else { 0.0 });
    let rejected = windows.rejected_count();
    if rejected > 0 {
        tracing::warn!(
            "Rejecting {} of {} windows with non-finite samples",
            rejected,
            windows.window_count()
        );
    }

    let taper_rows = |matrix: &Array2<f64>| {
        let mut tapered = matrix * window;
        Zip::from(tapered.rows_mut()).and(&windows.finite).for_each(|mut row, &ok| {
            if !ok {
                row.fill(0.0);
            }
        });
        tapered
    };
    let input = taper_rows(&windows.input);
    let gyro = taper_rows(&windows.gyro);
    let throttle = taper_rows(&windows.throttle);

    let deconvolved = engine.deconvolve(&input, &gyro, cut_freq)?;
    let mut step_response = Array2::zeros((windows.window_count(), response_len));
    Zip::from(step_response.rows_mut())
        .and(deconvolved.data.rows())
        .for_each(|mut dst, impulse| dst.assign(&cumsum(impulse.slice(s![..response_len]))));

    let zero_invalid = |values: Array1<f64>| &values * &valid;
    Ok(ResponseResult {
        step_response,
        avg_time: zero_invalid(row_mean(&windows.time.mapv(|t| if t.is_finite() { t } else { 0.0 }))),
        avg_input: row_mean(&input.mapv(f64::abs)),
        max_input: row_max_abs(&input),
        max_throttle: row_max_abs(&throttle),
        valid,
    })
}


// src/data_analysis/step_response.rs
