// src/data_analysis/window_functions.rs

use ndarray::Array1;
use std::f64::consts::PI;

/// Makes a Tukey window for enveloping.
///
/// `alpha <= 0` gives a rectangular window and `alpha >= 1` a Hanning window.
/// In between, the cosine tapers cover `alpha / 2` of the normalized length
/// on each side, evaluated on `linspace(0, 1, num)`.
pub fn tukeywin(num: usize, alpha: f64) -> Array1<f64> {
    if alpha <= 0.0 {
        return Array1::ones(num);
    } else if alpha >= 1.0 {
        return hanning(num);
    }
    if num <= 1 {
        return Array1::ones(num);
    }
    let half = alpha / 2.0;
    let step = 1.0 / (num as f64 - 1.0);
    Array1::from_shape_fn(num, |i| {
        let x = i as f64 * step;
        if x < half {
            0.5 * (1.0 + (2.0 * PI / alpha * (x - half)).cos())
        } else if x >= 1.0 - half {
            0.5 * (1.0 + (2.0 * PI / alpha * (x - 1.0 + half)).cos())
        } else {
            1.0
        }
    })
}

/// Generates a Hanning window of specified length: `0.5 - 0.5 cos(2πn / (M-1))`.
/// A single-sample window is `[1.0]`.
pub fn hanning(num: usize) -> Array1<f64> {
    if num <= 1 {
        return Array1::ones(num);
    }
    let denom = num as f64 - 1.0;
    Array1::from_shape_fn(num, |i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
}


// src/data_analysis/window_functions.rs
