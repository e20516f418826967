// src/data_analysis/response_metrics.rs

//! Scalar characteristics of a representative step-response curve.

use ndarray::Array1;
use ndarray_stats::QuantileExt;
use serde::Serialize;

use crate::constants::{SETTLING_BAND, STEADY_STATE_END_S, STEADY_STATE_START_S};

// Below this the curve is treated as flat and no metrics are reported.
const MIN_STEADY_STATE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResponseMetrics {
    pub steady_state: f64,
    pub peak_value: f64,
    pub peak_time_s: f64,
    /// Peak above steady state in percent, 0 when the curve never exceeds it
    pub overshoot_percent: f64,
    /// 10% to 90% of steady state
    pub rise_time_s: Option<f64>,
    /// Time to 50% of steady state (Td)
    pub delay_s: Option<f64>,
    /// Time after which the curve stays within ±5% of steady state
    pub settling_time_s: Option<f64>,
}

/// Interpolated time at which `normalized` first reaches `level`.
fn crossing_time(time: &Array1<f64>, normalized: &Array1<f64>, level: f64) -> Option<f64> {
    let i = normalized.iter().position(|&v| v >= level)?;
    if i == 0 {
        return Some(time[0]);
    }
    let (v0, v1) = (normalized[i - 1], normalized[i]);
    let frac = if v1 > v0 { (level - v0) / (v1 - v0) } else { 0.0 };
    Some(time[i - 1] + frac * (time[i] - time[i - 1]))
}

/// Mean over the steady-state window (0.2 s to 0.5 s), clamped to the curve.
pub fn steady_state_value(time: &Array1<f64>, response: &Array1<f64>) -> Option<f64> {
    let last = response.len().checked_sub(1)?;
    let start = time
        .iter()
        .position(|&t| t >= STEADY_STATE_START_S)
        .unwrap_or(last);
    let end = time
        .iter()
        .rposition(|&t| t <= STEADY_STATE_END_S)
        .unwrap_or(last)
        .max(start);
    let segment = response.slice(ndarray::s![start..=end]);
    segment.mean()
}

/// Computes metrics for `response` sampled at `time` (seconds from the step).
/// Returns `None` for empty, flat or non-finite curves.
pub fn response_metrics(time: &Array1<f64>, response: &Array1<f64>) -> Option<ResponseMetrics> {
    if time.len() != response.len() || response.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let steady_state = steady_state_value(time, response)?;
    if !steady_state.is_finite() || steady_state.abs() < MIN_STEADY_STATE {
        return None;
    }

    let normalized = response.mapv(|v| v / steady_state);
    let peak_index = normalized.argmax().ok()?;
    let peak_norm = normalized[peak_index];

    let rise_time_s = match (crossing_time(time, &normalized, 0.1), crossing_time(time, &normalized, 0.9)) {
        (Some(t10), Some(t90)) => Some(t90 - t10),
        _ => None,
    };

    let settling_time_s = match normalized.iter().rposition(|&v| (v - 1.0).abs() > SETTLING_BAND) {
        None => Some(time[0]),
        Some(i) if i + 1 < time.len() => Some(time[i + 1]),
        Some(_) => None,
    };

    Some(ResponseMetrics {
        steady_state,
        peak_value: response[peak_index],
        peak_time_s: time[peak_index],
        overshoot_percent: ((peak_norm - 1.0) * 100.0).max(0.0),
        rise_time_s,
        delay_s: crossing_time(time, &normalized, 0.5),
        settling_time_s,
    })
}


// src/data_analysis/response_metrics.rs
