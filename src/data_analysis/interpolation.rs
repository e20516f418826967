// src/data_analysis/interpolation.rs

//! Resampling onto a uniform time base.
//!
//! Blackbox logs are not perfectly periodic (dropped frames, jittery loop
//! timing), so every channel is interpolated onto
//! `linspace(t0, t_end, n)` before windowing.

use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{check_len, AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMethod {
    #[default]
    Linear,
    Nearest,
    /// Natural cubic spline
    Cubic,
}

/// Evenly spaced samples over `[start, end]`, both ends included.
pub fn linspace(start: f64, end: f64, count: usize) -> Array1<f64> {
    match count {
        0 => Array1::zeros(0),
        1 => Array1::from_elem(1, start),
        _ => {
            let step = (end - start) / (count - 1) as f64;
            let mut out = Array1::from_shape_fn(count, |i| start + i as f64 * step);
            out[count - 1] = end;
            out
        }
    }
}

fn check_increasing(x: &Array1<f64>) -> Result<()> {
    if let Some(i) = x.windows(2).into_iter().position(|w| !(w[1] > w[0])) {
        return Err(AnalysisError::NotMonotonic(format!(
            "x[{}] = {} is not below x[{}] = {}",
            i,
            x[i],
            i + 1,
            x[i + 1]
        )));
    }
    Ok(())
}

/// Index `i` such that `x[i] <= q <= x[i + 1]`, with `q` already clamped.
fn segment(x: &Array1<f64>, q: f64) -> usize {
    let slice = x.as_slice().unwrap_or(&[]);
    let upper = if slice.is_empty() {
        x.iter().position(|&v| v > q).unwrap_or(x.len())
    } else {
        slice.partition_point(|&v| v <= q)
    };
    upper.saturating_sub(1).min(x.len() - 2)
}

/// Second derivatives of a natural cubic spline through `(x, y)`.
fn spline_second_derivatives(x: &Array1<f64>, y: &Array1<f64>) -> Vec<f64> {
    let n = x.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }
    // Tridiagonal system for the interior knots (Thomas algorithm).
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];
    for i in 1..n - 1 {
        let h0 = x[i] - x[i - 1];
        let h1 = x[i + 1] - x[i];
        let a = h0;
        let b = 2.0 * (h0 + h1);
        let c = h1;
        let d = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
        let denom = b - a * c_prime[i - 1];
        c_prime[i] = c / denom;
        d_prime[i] = (d - a * d_prime[i - 1]) / denom;
    }
    for i in (1..n - 1).rev() {
        m[i] = d_prime[i] - c_prime[i] * m[i + 1];
    }
    m
}

/// Interpolates `(x, y)` at `x_new`. `x` must be strictly increasing; queries
/// outside `[x0, x_end]` take the end values.
pub fn interpolate(
    x: &Array1<f64>,
    y: &Array1<f64>,
    x_new: &Array1<f64>,
    method: InterpolationMethod,
) -> Result<Array1<f64>> {
    check_len("interpolation samples", x.len(), y.len())?;
    if x.is_empty() {
        return Err(AnalysisError::InsufficientData("interpolation needs at least one sample".into()));
    }
    if x.len() == 1 {
        return Ok(Array1::from_elem(x_new.len(), y[0]));
    }
    check_increasing(x)?;

    let first = x[0];
    let last = x[x.len() - 1];
    let second = match method {
        InterpolationMethod::Cubic => spline_second_derivatives(x, y),
        _ => Vec::new(),
    };

    Ok(x_new.mapv(|q| {
        let q = q.clamp(first, last);
        let i = segment(x, q);
        let (x0, x1) = (x[i], x[i + 1]);
        let (y0, y1) = (y[i], y[i + 1]);
        let h = x1 - x0;
        let t = (q - x0) / h;
        match method {
            InterpolationMethod::Linear => y0 + t * (y1 - y0),
            InterpolationMethod::Nearest => {
                if t <= 0.5 {
                    y0
                } else {
                    y1
                }
            }
            InterpolationMethod::Cubic => {
                let a = 1.0 - t;
                a * y0
                    + t * y1
                    + ((a * a * a - a) * second[i] + (t * t * t - t) * second[i + 1]) * h * h / 6.0
            }
        }
    }))
}

/// Linear interpolation shorthand.
pub fn linear_interpolate(x: &Array1<f64>, y: &Array1<f64>, x_new: &Array1<f64>) -> Result<Array1<f64>> {
    interpolate(x, y, x_new, InterpolationMethod::Linear)
}

/// Indices of samples whose timestamp rises above every earlier kept one.
fn increasing_samples(time: &Array1<f64>) -> Vec<usize> {
    let mut last = f64::NEG_INFINITY;
    let mut keep = Vec::with_capacity(time.len());
    for (i, &t) in time.iter().enumerate() {
        if t > last {
            keep.push(i);
            last = t;
        }
    }
    keep
}

/// Resamples channels recorded at `time` onto `linspace(t0, t_end, n)`.
/// Samples whose timestamp does not advance (repeated or out-of-order rows)
/// are dropped first. Returns the new time base and the resampled channels
/// in order.
pub fn equalize(time: &Array1<f64>, channels: &[&Array1<f64>]) -> Result<(Array1<f64>, Vec<Array1<f64>>)> {
    for channel in channels {
        check_len("equalize channel", time.len(), channel.len())?;
    }
    let keep = increasing_samples(time);
    let dropped = time.len() - keep.len();
    if dropped > 0 {
        tracing::warn!(
            "Dropping {} of {} samples with non-increasing timestamps",
            dropped,
            time.len()
        );
    }
    let time = time.select(Axis(0), &keep);
    let channels: Vec<Array1<f64>> = channels.iter().map(|c| c.select(Axis(0), &keep)).collect();

    let n = time.len();
    if n == 0 {
        return Ok((Array1::zeros(0), channels.iter().map(|_| Array1::zeros(0)).collect()));
    }
    let new_time = linspace(time[0], time[n - 1], n);
    let resampled = channels
        .iter()
        .map(|channel| linear_interpolate(&time, channel, &new_time))
        .collect::<Result<Vec<_>>>()?;
    Ok((new_time, resampled))
}


// src/data_analysis/interpolation.rs
