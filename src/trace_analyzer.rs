// src/trace_analyzer.rs

//! Per-axis and per-session pipeline: step-response path and noise path
//! wired together around one immutable [`AnalyzerConfig`].

use ndarray::{Array1, Array2, Zip};
use rayon::prelude::*;

use crate::axis_names::{Axis, AXIS_COUNT};
use crate::config::AnalyzerConfig;
use crate::data_analysis::heatmap::{noise_heatmap, response_heatmap, ThrottleHeatmap};
use crate::data_analysis::interpolation::equalize;
use crate::data_analysis::mode_average::{weighted_mode_average, ModeAverage};
use crate::data_analysis::response_metrics::{response_metrics, ResponseMetrics};
use crate::data_analysis::spectrum::{spectrum, SpectrumResult};
use crate::data_analysis::stacker::{Stacker, WindowSet};
use crate::data_analysis::step_response::{
    combine_masks, low_high_mask, movement_mask, stack_response, ResponseResult,
};
use crate::data_analysis::wiener::WienerDeconvolution;
use crate::data_analysis::window_functions::tukeywin;
use crate::data_input::telemetry::{TelemetrySeries, TelemetrySession};
use crate::error::{ensure_finite, Result};

/// Window weights used for the representative curves.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMasks {
    /// Valid windows with max input above `min_input`
    pub movement: Array1<f64>,
    /// Moving windows at or below `threshold`
    pub low: Array1<f64>,
    /// Moving windows above `threshold`, all zero when too few
    pub high: Array1<f64>,
}

/// A representative step response and its metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCurve {
    pub curve: ModeAverage,
    pub metrics: Option<ResponseMetrics>,
    /// Sum of window weights behind the curve
    pub weight: f64,
}

/// Spectra of one noise channel with their throttle heatmap.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseSpectrum {
    pub spectrum: SpectrumResult,
    pub heatmap: ThrottleHeatmap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoiseAnalysis {
    /// Max throttle per noise window (-1 for rejected windows)
    pub max_throttle: Array1<f64>,
    pub gyro: NoiseSpectrum,
    pub debug: Option<NoiseSpectrum>,
}

/// Everything computed for one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisAnalysis {
    pub response: ResponseResult,
    pub masks: WindowMasks,
    pub combined: Option<ResponseCurve>,
    pub low: Option<ResponseCurve>,
    pub high: Option<ResponseCurve>,
    pub response_heatmap: Option<ThrottleHeatmap>,
    pub noise: Option<NoiseAnalysis>,
    pub window_count: usize,
    /// Windows dropped because they held non-finite samples
    pub rejected_windows: usize,
}

/// Immutable analyzer; safe to share across threads.
#[derive(Debug, Clone)]
pub struct TraceAnalyzer {
    config: AnalyzerConfig,
    engine: WienerDeconvolution,
    response_stacker: Stacker,
    noise_stacker: Stacker,
    taper: Array1<f64>,
}

impl TraceAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let engine = WienerDeconvolution::new(config.dt(), config.deconvolution_alpha)?;
        let response_stacker = Stacker::with_p_scale(config.window_size, config.overlap, config.p_scale)?;
        let noise_stacker = Stacker::with_p_scale(config.noise_window_size, config.noise_overlap, config.p_scale)?;
        let taper = tukeywin(config.window_size, config.taper_alpha);
        Ok(Self {
            config,
            engine,
            response_stacker,
            noise_stacker,
            taper,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Runs both paths on one axis. With `p_gain` the series input channel
    /// is taken as the raw P-term and the loop input is reconstructed.
    pub fn analyze_axis(&self, series: &TelemetrySeries, p_gain: Option<f64>) -> Result<AxisAnalysis> {
        let series = if self.config.equalize_time {
            equalize_series(series)?
        } else {
            series.clone()
        };

        let windows = self.response_stacker.stack(&series, p_gain)?;
        let response = stack_response(
            &windows,
            &self.taper,
            &self.engine,
            self.config.cut_freq,
            self.config.response_len,
        )?;
        let masks = self.masks(&response)?;

        let combined = self.curve(&response, &masks.movement)?;
        let low = self.curve(&response, &masks.low)?;
        let high = self.curve(&response, &masks.high)?;

        let response_heatmap = if windows.is_empty() {
            None
        } else {
            let time = Array1::from_shape_fn(self.config.response_len, |i| i as f64 / self.config.sample_rate);
            Some(response_heatmap(
                &response.max_throttle,
                &masks.movement,
                &time,
                &response.step_response,
                self.config.throttle_bins,
            )?)
        };

        let noise_windows = self.noise_stacker.stack(&series, None)?;
        let noise = self.noise(&noise_windows)?;

        tracing::info!(
            "Analyzed {} windows ({} rejected): combined {}, low {}, high {}",
            windows.window_count(),
            windows.rejected_count(),
            combined.is_some(),
            low.is_some(),
            high.is_some()
        );

        Ok(AxisAnalysis {
            window_count: windows.window_count(),
            rejected_windows: windows.rejected_count(),
            response,
            masks,
            combined,
            low,
            high,
            response_heatmap,
            noise,
        })
    }

    /// Analyzes every axis of `session` in parallel. Axes without samples,
    /// axes without a P gain and axes whose analysis fails (logged) yield
    /// `None`.
    pub fn analyze_session(&self, session: &TelemetrySession) -> [Option<AxisAnalysis>; AXIS_COUNT] {
        if let Some(rate) = session.sample_rate {
            if (rate - self.config.sample_rate).abs() > 0.01 * self.config.sample_rate {
                tracing::warn!(
                    "Session sample rate {:.1} Hz differs from configured {:.1} Hz",
                    rate,
                    self.config.sample_rate
                );
            }
        }

        let results: Vec<Option<AxisAnalysis>> = Axis::ALL
            .par_iter()
            .map(|&axis| {
                if session.is_empty() {
                    return None;
                }
                // Session input channels hold the raw P-term, usable only with the gain.
                let Some(p_gain) = session.p_gains[axis.index()] else {
                    tracing::warn!("{} axis has no P gain; skipping step response and noise analysis", axis);
                    return None;
                };
                let analysis = session
                    .axis(axis)
                    .and_then(|series| self.analyze_axis(&series, Some(p_gain)));
                match analysis {
                    Ok(analysis) => Some(analysis),
                    Err(e) => {
                        tracing::warn!("{} axis analysis failed: {}", axis, e);
                        None
                    }
                }
            })
            .collect();

        let mut results = results.into_iter();
        std::array::from_fn(|_| results.next().flatten())
    }

    fn masks(&self, response: &ResponseResult) -> Result<WindowMasks> {
        let movement = combine_masks(&movement_mask(&response.max_input, self.config.min_input), &response.valid)?;
        let split = low_high_mask(&response.max_input, self.config.threshold);
        let low = combine_masks(&split.low, &movement)?;
        let high = combine_masks(&split.high, &movement)?;
        Ok(WindowMasks { movement, low, high })
    }

    fn curve(&self, response: &ResponseResult, mask: &Array1<f64>) -> Result<Option<ResponseCurve>> {
        let weight = mask.sum();
        if weight <= 0.0 {
            return Ok(None);
        }
        let curve = weighted_mode_average(
            &response.step_response,
            mask,
            self.config.vert_range,
            self.config.vert_bins,
            self.config.sample_rate,
            self.config.mode_estimator,
        )?;
        ensure_finite("step response curve", curve.values.iter())?;
        let metrics = response_metrics(&curve.time, &curve.values);
        Ok(Some(ResponseCurve { curve, metrics, weight }))
    }

    fn noise(&self, windows: &WindowSet) -> Result<Option<NoiseAnalysis>> {
        if windows.is_empty() {
            return Ok(None);
        }
        let max_throttle = Zip::from(&windows.max_throttle())
            .and(&windows.finite)
            .map_collect(|&thr, &ok| if ok { thr } else { -1.0 });

        let channel = |traces: &Array2<f64>| -> Result<NoiseSpectrum> {
            let spectrum = spectrum(&windows.time, traces)?;
            let heatmap = noise_heatmap(&max_throttle, &spectrum, self.config.throttle_bins, self.config.heatmap_sigma)?;
            ensure_finite("noise heatmap", heatmap.normalized.iter())?;
            Ok(NoiseSpectrum { spectrum, heatmap })
        };

        let gyro = channel(&windows.gyro)?;
        let debug = windows.debug.as_ref().map(channel).transpose()?;
        Ok(Some(NoiseAnalysis {
            max_throttle,
            gyro,
            debug,
        }))
    }
}

/// Resamples every channel of `series` onto a uniform time base.
fn equalize_series(series: &TelemetrySeries) -> Result<TelemetrySeries> {
    if series.len() < 2 {
        return Ok(series.clone());
    }
    let mut channels = vec![&series.input, &series.gyro, &series.throttle];
    if let Some(debug) = &series.debug {
        channels.push(debug);
    }
    let (time, mut resampled) = equalize(&series.time, &channels)?;
    let debug = (resampled.len() > 3).then(|| resampled.remove(3));
    let throttle = resampled.remove(2);
    let gyro = resampled.remove(1);
    let input = resampled.remove(0);
    let equalized = TelemetrySeries::new(time, input, gyro, throttle)?;
    match debug {
        Some(debug) => equalized.with_debug(debug),
        None => Ok(equalized),
    }
}


// src/trace_analyzer.rs
