// src/data_analysis/stacker.rs

//! Segments a telemetry series into fixed-length overlapping windows.

use ndarray::{s, Array1, Array2, ArrayView1, Axis};

use crate::constants::P_SCALE;
use crate::data_input::telemetry::TelemetrySeries;
use crate::error::{AnalysisError, Result};

/// Reconstructs the PID-loop input from a P-term sample.
pub fn pid_in(pval: f64, gyro: f64, pid_p: f64) -> f64 {
    gyro + pval / (P_SCALE * pid_p)
}

/// [`pid_in`] with an explicit P-term scale.
pub fn pid_in_scaled(pval: f64, gyro: f64, pid_p: f64, p_scale: f64) -> f64 {
    gyro + pval / (p_scale * pid_p)
}

/// Window shift in samples: `floor(window_size * (1 - overlap))`, at least 1.
pub fn window_stride(window_size: usize, overlap: f64) -> usize {
    ((window_size as f64 * (1.0 - overlap)).floor() as usize).max(1)
}

/// Number of complete windows of `window_size` samples that fit into
/// `series_len` when advancing by `stride`.
pub fn window_count(series_len: usize, window_size: usize, stride: usize) -> usize {
    if window_size == 0 || stride == 0 || series_len < window_size {
        0
    } else {
        (series_len - window_size) / stride + 1
    }
}

/// Parallel window matrices, one row per window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    pub input: Array2<f64>,
    pub gyro: Array2<f64>,
    pub throttle: Array2<f64>,
    pub time: Array2<f64>,
    pub debug: Option<Array2<f64>>,
    /// `false` for windows holding any non-finite input, gyro or throttle sample.
    pub finite: Array1<bool>,
}

fn max_abs(row: ArrayView1<f64>) -> f64 {
    row.iter().fold(0.0, |m, v| m.max(v.abs()))
}

impl WindowSet {
    /// A set with no windows, `window_length` columns wide.
    pub fn empty(window_length: usize, with_debug: bool) -> Self {
        Self {
            input: Array2::zeros((0, window_length)),
            gyro: Array2::zeros((0, window_length)),
            throttle: Array2::zeros((0, window_length)),
            time: Array2::zeros((0, window_length)),
            debug: with_debug.then(|| Array2::zeros((0, window_length))),
            finite: Array1::from_elem(0, true),
        }
    }

    pub fn window_count(&self) -> usize {
        self.input.nrows()
    }

    pub fn window_length(&self) -> usize {
        self.input.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.window_count() == 0
    }

    pub fn rejected_count(&self) -> usize {
        self.finite.iter().filter(|&&ok| !ok).count()
    }

    /// Max |input| per window; 0 for non-finite windows.
    pub fn max_input(&self) -> Array1<f64> {
        self.per_window(&self.input, max_abs)
    }

    /// Max |throttle| per window; 0 for non-finite windows.
    pub fn max_throttle(&self) -> Array1<f64> {
        self.per_window(&self.throttle, max_abs)
    }

    /// Mean time per window; 0 for non-finite windows.
    pub fn mean_time(&self) -> Array1<f64> {
        self.per_window(&self.time, |row| row.mean().unwrap_or(0.0))
    }

    fn per_window<F>(&self, matrix: &Array2<f64>, f: F) -> Array1<f64>
    where
        F: Fn(ArrayView1<f64>) -> f64,
    {
        Array1::from_shape_fn(self.window_count(), |i| {
            if self.finite[i] {
                f(matrix.row(i))
            } else {
                0.0
            }
        })
    }
}

/// Zeros every row that holds a non-finite sample. Returns how many rows
/// were zeroed.
pub fn zero_non_finite_rows(matrix: &mut Array2<f64>) -> usize {
    let mut zeroed = 0;
    for mut row in matrix.axis_iter_mut(Axis(0)) {
        if row.iter().any(|v| !v.is_finite()) {
            row.fill(0.0);
            zeroed += 1;
        }
    }
    zeroed
}

/// Window segmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stacker {
    window_size: usize,
    overlap: f64,
    p_scale: f64,
}

impl Stacker {
    pub fn new(window_size: usize, overlap: f64) -> Result<Self> {
        Self::with_p_scale(window_size, overlap, P_SCALE)
    }

    pub fn with_p_scale(window_size: usize, overlap: f64, p_scale: f64) -> Result<Self> {
        if window_size == 0 {
            return Err(AnalysisError::InvalidConfig("window size must be > 0".into()));
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(AnalysisError::InvalidConfig(format!(
                "overlap must be in [0, 1), got {}",
                overlap
            )));
        }
        if !(p_scale.is_finite() && p_scale != 0.0) {
            return Err(AnalysisError::InvalidConfig(format!("invalid P scale {}", p_scale)));
        }
        Ok(Self {
            window_size,
            overlap,
            p_scale,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn stride(&self) -> usize {
        window_stride(self.window_size, self.overlap)
    }

    /// Slices `series` into windows at offsets `0, stride, 2·stride, ...`.
    ///
    /// With `p_gain` the input channel is treated as the raw P-term and the
    /// loop input is reconstructed per sample with [`pid_in_scaled`].
    /// A series shorter than one window yields an empty set.
    pub fn stack(&self, series: &TelemetrySeries, p_gain: Option<f64>) -> Result<WindowSet> {
        if let Some(p) = p_gain {
            if !(p.is_finite() && p != 0.0) {
                return Err(AnalysisError::InvalidConfig(format!("axis P gain must be finite and non-zero, got {}", p)));
            }
        }

        let len = self.window_size;
        let stride = self.stride();
        let count = window_count(series.len(), len, stride);
        if count == 0 {
            tracing::debug!(
                "Series of {} samples is shorter than one {}-sample window",
                series.len(),
                len
            );
            return Ok(WindowSet::empty(len, series.debug.is_some()));
        }

        let input_channel = match p_gain {
            Some(p) => {
                let scale = self.p_scale;
                ndarray::Zip::from(&series.input)
                    .and(&series.gyro)
                    .map_collect(|&pval, &gyro| pid_in_scaled(pval, gyro, p, scale))
            }
            None => series.input.clone(),
        };

        let stack_channel = |data: &Array1<f64>| {
            let mut stacked = Array2::<f64>::zeros((count, len));
            for (i, mut row) in stacked.axis_iter_mut(Axis(0)).enumerate() {
                let start = i * stride;
                row.assign(&data.slice(s![start..start + len]));
            }
            stacked
        };

        let input = stack_channel(&input_channel);
        let gyro = stack_channel(&series.gyro);
        let throttle = stack_channel(&series.throttle);
        let time = stack_channel(&series.time);
        let debug = series.debug.as_ref().map(stack_channel);

        let finite = Array1::from_shape_fn(count, |i| {
            [&input, &gyro, &throttle]
                .iter()
                .all(|m| m.row(i).iter().all(|v| v.is_finite()))
        });

        tracing::debug!("Stacked {} windows of {} samples (stride {})", count, len, stride);
        Ok(WindowSet {
            input,
            gyro,
            throttle,
            time,
            debug,
            finite,
        })
    }
}


// src/data_analysis/stacker.rs
