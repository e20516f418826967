// src/data_input/telemetry.rs

//! Columnar telemetry handed over by the log decoder.

use ndarray::Array1;

use crate::axis_names::{Axis, AXIS_COUNT};
use crate::data_input::log_data::LogRowData;
use crate::error::{check_len, Result};

/// One axis worth of equally long, sample-indexed channels.
///
/// `input` is either the PID-loop input itself or, when the analyzer is
/// given the axis P gain, the raw P-term from which the loop input is
/// reconstructed during windowing.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySeries {
    pub time: Array1<f64>, // Seconds
    pub input: Array1<f64>,
    pub gyro: Array1<f64>,
    pub throttle: Array1<f64>,
    pub debug: Option<Array1<f64>>,
}

impl TelemetrySeries {
    pub fn new(time: Array1<f64>, input: Array1<f64>, gyro: Array1<f64>, throttle: Array1<f64>) -> Result<Self> {
        check_len("telemetry input", time.len(), input.len())?;
        check_len("telemetry gyro", time.len(), gyro.len())?;
        check_len("telemetry throttle", time.len(), throttle.len())?;
        Ok(Self {
            time,
            input,
            gyro,
            throttle,
            debug: None,
        })
    }

    /// Attaches a debug channel (e.g. unfiltered gyro) for noise analysis.
    pub fn with_debug(mut self, debug: Array1<f64>) -> Result<Self> {
        check_len("telemetry debug", self.time.len(), debug.len())?;
        self.debug = Some(debug);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Estimates the sample rate from the mean positive time step, `None`
/// when fewer than two distinct timestamps exist.
pub fn estimate_sample_rate(time_s: &Array1<f64>) -> Option<f64> {
    let (total_delta, count) = time_s
        .windows(2)
        .into_iter()
        .map(|w| w[1] - w[0])
        .filter(|&delta| delta > 1e-9)
        .fold((0.0, 0usize), |(sum, n), delta| (sum + delta, n + 1));
    if count == 0 {
        return None;
    }
    Some(1.0 / (total_delta / count as f64))
}

fn column<F>(rows: &[&LogRowData], field: F) -> Array1<f64>
where
    F: Fn(&LogRowData) -> Option<f64>,
{
    rows.iter().map(|r| field(*r).unwrap_or(f64::NAN)).collect()
}

/// A complete decoded session: shared time base and throttle plus
/// per-axis P-term, gyro and debug channels.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySession {
    pub time: Array1<f64>, // Seconds
    pub p_term: [Array1<f64>; AXIS_COUNT],
    pub gyro: [Array1<f64>; AXIS_COUNT],
    pub throttle: Array1<f64>,
    pub debug: [Option<Array1<f64>>; AXIS_COUNT],
    pub sample_rate: Option<f64>,
    /// Static P gain per axis from the log header.
    pub p_gains: [Option<f64>; AXIS_COUNT],
}

impl TelemetrySession {
    /// Builds columns from decoded rows. Rows without a timestamp are
    /// skipped; missing channel values become NaN so the affected windows
    /// can be rejected later. Debug channels that are absent in every row
    /// are dropped entirely.
    pub fn from_rows(rows: &[LogRowData], sample_rate: Option<f64>, p_gains: [Option<f64>; AXIS_COUNT]) -> Self {
        let timed: Vec<&LogRowData> = rows.iter().filter(|r| r.time_us.is_some()).collect();
        let skipped = rows.len() - timed.len();
        if skipped > 0 {
            tracing::warn!("Skipping {} rows without a timestamp", skipped);
        }

        let time = column(&timed, |r| r.time_us.map(|t| t / 1_000_000.0));
        let p_term = std::array::from_fn(|axis| column(&timed, |r| r.p_term[axis]));
        let gyro = std::array::from_fn(|axis| column(&timed, |r| r.gyro[axis]));
        let throttle = column(&timed, |r| r.throttle);
        let debug = std::array::from_fn(|axis| {
            let present = timed.iter().any(|r| r.debug[axis].is_some());
            present.then(|| column(&timed, |r| r.debug[axis]))
        });

        let sample_rate = sample_rate.or_else(|| estimate_sample_rate(&time));
        match sample_rate {
            Some(rate) => tracing::debug!("Session of {} rows at {:.2} Hz", time.len(), rate),
            None => tracing::warn!("Could not determine sample rate (need >= 2 distinct timestamps)"),
        }

        Self {
            time,
            p_term,
            gyro,
            throttle,
            debug,
            sample_rate,
            p_gains,
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Per-axis series with the P-term in the `input` channel.
    pub fn axis(&self, axis: Axis) -> Result<TelemetrySeries> {
        let i = axis.index();
        let series = TelemetrySeries::new(
            self.time.clone(),
            self.p_term[i].clone(),
            self.gyro[i].clone(),
            self.throttle.clone(),
        )?;
        match &self.debug[i] {
            Some(debug) => series.with_debug(debug.clone()),
            None => Ok(series),
        }
    }
}


// src/data_input/telemetry.rs
