// src/data_analysis/spectrum.rs

//! Per-window magnitude spectra.

use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::data_analysis::fft_utils::{next_power_of_two, rfftfreq, RealFftPlan};
use crate::data_analysis::stacker::zero_non_finite_rows;
use crate::data_analysis::window_functions::hanning;
use crate::error::{AnalysisError, Result};

/// Frequencies (Hz) and one magnitude row per window.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumResult {
    pub frequencies: Array1<f64>,
    /// windows × frequency bins
    pub magnitude: Array2<f64>,
}

impl SpectrumResult {
    pub fn window_count(&self) -> usize {
        self.magnitude.nrows()
    }
}

/// Hanning-tapered, zero-padded real FFT magnitude of every row of `traces`,
/// scaled by `1/sqrt(n_fft)`. The sampling interval is read from the first
/// two samples of the first `time` row. Rows holding non-finite samples are
/// zeroed.
pub fn spectrum(time: &Array2<f64>, traces: &Array2<f64>) -> Result<SpectrumResult> {
    if time.dim() != traces.dim() {
        return Err(AnalysisError::ShapeMismatch {
            context: "spectrum",
            expected: traces.dim(),
            actual: time.dim(),
        });
    }
    let (rows, len) = traces.dim();
    if rows == 0 || len < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "spectrum needs at least one window of 2+ samples, got {}x{}",
            rows, len
        )));
    }
    let dt = time[[0, 1]] - time[[0, 0]];
    if !(dt.is_finite() && dt > 0.0) {
        return Err(AnalysisError::NotMonotonic(format!("window time step {} is not positive", dt)));
    }

    let mut clean = traces.to_owned();
    let zeroed = zero_non_finite_rows(&mut clean);
    if zeroed > 0 {
        tracing::warn!("Zeroed {} of {} spectrum windows with non-finite samples", zeroed, rows);
    }

    let n_fft = next_power_of_two(len);
    let plan = RealFftPlan::new(n_fft)?;
    let taper = hanning(len);
    let scale = 1.0 / (n_fft as f64).sqrt();

    let spectra = (0..rows)
        .into_par_iter()
        .map(|i| {
            let tapered = (&clean.row(i) * &taper).to_vec();
            plan.process(&tapered).map(|bins| bins.mapv(|c| c.norm() * scale))
        })
        .collect::<Result<Vec<Array1<f64>>>>()?;

    let mut magnitude = Array2::zeros((rows, n_fft / 2 + 1));
    for (mut dst, row) in magnitude.rows_mut().into_iter().zip(spectra.iter()) {
        dst.assign(row);
    }
    tracing::debug!("Spectrum of {} windows, FFT size {}, dt {:.6} s", rows, n_fft, dt);

    Ok(SpectrumResult {
        frequencies: rfftfreq(n_fft, dt),
        magnitude,
    })
}


// src/data_analysis/spectrum.rs
