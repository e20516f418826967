// src/config.rs

//! Analyzer configuration.
//!
//! Everything the pipeline used to read from process-wide constants is
//! carried here so tests (and callers) can run it with arbitrary values.
//! `constants.rs` only provides the defaults.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{AnalysisError, Result};

/// How a representative value is pulled out of each histogram time column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModeEstimator {
    /// Centre of the heaviest value bucket (ties go to the lowest bucket).
    Peak,
    /// Gaussian-smoothed column, squared-weight average over bucket positions.
    Smoothed { sigma: f64 },
}

impl ModeEstimator {
    /// Smoothed estimator with the default kernel width.
    pub fn smoothed() -> Self {
        ModeEstimator::Smoothed {
            sigma: MODE_SMOOTHING_SIGMA,
        }
    }
}

impl Default for ModeEstimator {
    fn default() -> Self {
        ModeEstimator::Peak
    }
}

/// Immutable configuration shared by every stage of a [`crate::TraceAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Sample rate (Hz) of the equalized telemetry
    pub sample_rate: f64,
    /// Wiener regularization corner (Hz)
    pub cut_freq: f64,
    /// P-term scale used to reconstruct the PID-loop input
    pub p_scale: f64,
    /// Samples per step-response window
    pub window_size: usize,
    /// Fractional window overlap in [0, 1)
    pub overlap: f64,
    /// Samples kept from each deconvolved window
    pub response_len: usize,
    /// Tukey alpha of the taper applied to stacked windows (1.0 = Hanning)
    pub taper_alpha: f64,
    /// Tukey alpha of the edge taper inside the deconvolution
    pub deconvolution_alpha: f64,
    /// Low/high input split (°/s)
    pub threshold: f64,
    /// Windows whose max input is at or below this are ignored (°/s)
    pub min_input: f64,
    pub vert_range: [f64; 2],
    pub vert_bins: usize,
    pub mode_estimator: ModeEstimator,
    /// Samples per noise-spectrum window
    pub noise_window_size: usize,
    pub noise_overlap: f64,
    pub throttle_bins: usize,
    /// Smoothing (bins) of the noise heatmap along the throttle axis
    pub heatmap_sigma: f64,
    /// Resample onto a uniform time base before windowing
    pub equalize_time: bool,
}

/// Number of samples covering `duration_s` at `sample_rate` (truncated).
pub fn samples_for(duration_s: f64, sample_rate: f64) -> usize {
    (duration_s * sample_rate) as usize
}

impl AnalyzerConfig {
    /// Default configuration with window lengths derived for `sample_rate`.
    pub fn for_sample_rate(sample_rate: f64) -> Self {
        let overlap = 1.0 - 1.0 / SUPERPOSITION_FACTOR as f64;
        let noise_overlap = 1.0 - 1.0 / NOISE_SUPERPOSITION_FACTOR as f64;
        Self {
            sample_rate,
            cut_freq: CUT_FREQ_HZ,
            p_scale: P_SCALE,
            window_size: samples_for(FRAME_LENGTH_S, sample_rate),
            overlap,
            response_len: samples_for(RESPONSE_LENGTH_S, sample_rate),
            taper_alpha: TUKEY_ALPHA,
            deconvolution_alpha: DECONVOLUTION_TUKEY_ALPHA,
            threshold: SETPOINT_THRESHOLD,
            min_input: MOVEMENT_THRESHOLD_DEG_S,
            vert_range: RESPONSE_VERT_RANGE,
            vert_bins: RESPONSE_VERT_BINS,
            mode_estimator: ModeEstimator::default(),
            noise_window_size: samples_for(NOISE_FRAME_LENGTH_S, sample_rate),
            noise_overlap,
            throttle_bins: THROTTLE_BINS,
            heatmap_sigma: HEATMAP_SMOOTHING_SIGMA,
            equalize_time: true,
        }
    }

    /// Sampling interval in seconds.
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Checks every value the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(AnalysisError::InvalidConfig(msg));
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return fail(format!("sample_rate must be positive, got {}", self.sample_rate));
        }
        if !(self.cut_freq.is_finite() && self.cut_freq > 0.0) {
            return fail(format!("cut_freq must be positive, got {}", self.cut_freq));
        }
        if !(self.p_scale.is_finite() && self.p_scale != 0.0) {
            return fail(format!("p_scale must be finite and non-zero, got {}", self.p_scale));
        }
        if self.window_size == 0 || self.noise_window_size == 0 {
            return fail("window sizes must be > 0".to_string());
        }
        for (name, overlap) in [("overlap", self.overlap), ("noise_overlap", self.noise_overlap)] {
            if !(0.0..1.0).contains(&overlap) {
                return fail(format!("{} must be in [0, 1), got {}", name, overlap));
            }
        }
        if self.response_len == 0 || self.response_len > self.window_size {
            return fail(format!(
                "response_len must be in 1..={}, got {}",
                self.window_size, self.response_len
            ));
        }
        if self.vert_bins == 0 || self.throttle_bins == 0 {
            return fail("histogram bin counts must be > 0".to_string());
        }
        if !(self.vert_range[0].is_finite() && self.vert_range[1].is_finite() && self.vert_range[0] < self.vert_range[1]) {
            return fail(format!("vert_range must be increasing, got {:?}", self.vert_range));
        }
        if let ModeEstimator::Smoothed { sigma } = self.mode_estimator {
            if !(sigma.is_finite() && sigma >= 0.0) {
                return fail(format!("smoothing sigma must be >= 0, got {}", sigma));
            }
        }
        Ok(())
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::for_sample_rate(DEFAULT_SAMPLE_RATE_HZ)
    }
}


// src/config.rs
