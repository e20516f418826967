// src/data_analysis/fft_utils.rs

//! Transform engine: complex and real FFTs, frequency bins and the
//! elementwise complex arithmetic used by the Wiener deconvolution.
//!
//! Convention: the forward transform is unnormalized and the inverse
//! divides by the length, so `ifft(fft(x)) == x` up to rounding.

use ndarray::{Array1, Zip};
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{check_len, AnalysisError, Result};

/// Real and imaginary coefficient arrays of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyPair {
    pub re: Array1<f64>,
    pub im: Array1<f64>,
}

impl FrequencyPair {
    pub fn new(re: Array1<f64>, im: Array1<f64>) -> Result<Self> {
        check_len("frequency pair", re.len(), im.len())?;
        Ok(Self { re, im })
    }

    /// Purely real pair (imaginary part zero).
    pub fn from_real(re: Array1<f64>) -> Self {
        let im = Array1::zeros(re.len());
        Self { re, im }
    }

    fn from_complex(data: &[Complex64]) -> Self {
        Self {
            re: data.iter().map(|c| c.re).collect(),
            im: data.iter().map(|c| c.im).collect(),
        }
    }

    fn to_complex(&self) -> Vec<Complex64> {
        self.re
            .iter()
            .zip(self.im.iter())
            .map(|(&re, &im)| Complex64::new(re, im))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.re.len()
    }

    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }

    /// Elementwise `self * other`.
    pub fn multiply(&self, other: &FrequencyPair) -> Result<FrequencyPair> {
        check_len("complex multiply", self.len(), other.len())?;
        let mut re = Array1::zeros(self.len());
        let mut im = Array1::zeros(self.len());
        Zip::from(&mut re)
            .and(&mut im)
            .and(&self.re)
            .and(&self.im)
            .and(&other.re)
            .and(&other.im)
            .for_each(|r, i, &a, &b, &c, &d| {
                *r = a * c - b * d;
                *i = a * d + b * c;
            });
        Ok(FrequencyPair { re, im })
    }

    /// Elementwise complex conjugate.
    pub fn conj(&self) -> FrequencyPair {
        FrequencyPair {
            re: self.re.clone(),
            im: self.im.mapv(|v| -v),
        }
    }

    /// Elementwise `self / denominator`. A missing `denom_im` means a purely
    /// real denominator. No regularization is added here; callers that can
    /// hit zero must add their own term first.
    pub fn divide(&self, denom_re: &Array1<f64>, denom_im: Option<&Array1<f64>>) -> Result<FrequencyPair> {
        check_len("complex divide", self.len(), denom_re.len())?;
        let mut re = Array1::zeros(self.len());
        let mut im = Array1::zeros(self.len());
        match denom_im {
            None => {
                Zip::from(&mut re)
                    .and(&mut im)
                    .and(&self.re)
                    .and(&self.im)
                    .and(denom_re)
                    .for_each(|r, i, &a, &b, &c| {
                        *r = a / c;
                        *i = b / c;
                    });
            }
            Some(denom_im) => {
                check_len("complex divide", self.len(), denom_im.len())?;
                Zip::from(&mut re)
                    .and(&mut im)
                    .and(&self.re)
                    .and(&self.im)
                    .and(denom_re)
                    .and(denom_im)
                    .for_each(|r, i, &a, &b, &c, &d| {
                        let q = Complex64::new(a, b) / Complex64::new(c, d);
                        *r = q.re;
                        *i = q.im;
                    });
            }
        }
        Ok(FrequencyPair { re, im })
    }

    /// `|z|` per bin.
    pub fn magnitude(&self) -> Array1<f64> {
        Zip::from(&self.re).and(&self.im).map_collect(|&re, &im| re.hypot(im))
    }
}

/// Calculates the next power of two `>= n` (1 for `n == 0`).
pub fn next_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

fn ensure_power_of_two(length: usize) -> Result<()> {
    if length == 0 || !length.is_power_of_two() {
        return Err(AnalysisError::NotPowerOfTwo(length));
    }
    Ok(())
}

/// Copies `data` into a zero-padded buffer of `length` samples.
fn padded(context: &'static str, data: &[f64], length: usize) -> Result<Vec<f64>> {
    if data.len() > length {
        return Err(AnalysisError::LengthMismatch {
            context,
            expected: length,
            actual: data.len(),
        });
    }
    let mut buffer = vec![0.0; length];
    buffer[..data.len()].copy_from_slice(data);
    Ok(buffer)
}

/// Forward and inverse complex FFT plans for one length, shareable across
/// threads.
#[derive(Clone)]
pub struct FftPlan {
    len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for FftPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftPlan").field("len", &self.len).finish()
    }
}

impl FftPlan {
    pub fn new(len: usize) -> Result<Self> {
        ensure_power_of_two(len)?;
        let mut planner = FftPlanner::<f64>::new();
        Ok(Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// In-place unnormalized forward transform. `buffer.len()` must equal the plan length.
    pub(crate) fn forward_in_place(&self, buffer: &mut [Complex64]) {
        debug_assert_eq!(buffer.len(), self.len);
        self.forward.process(buffer);
    }

    /// In-place inverse transform scaled by `1/len`.
    pub(crate) fn inverse_in_place(&self, buffer: &mut [Complex64]) {
        debug_assert_eq!(buffer.len(), self.len);
        self.inverse.process(buffer);
        let scale = 1.0 / self.len as f64;
        for v in buffer.iter_mut() {
            *v *= scale;
        }
    }

    /// Forward transform of a (real, imag) pair, zero-padded to the plan length.
    pub fn forward(&self, real: &[f64], imag: Option<&[f64]>) -> Result<FrequencyPair> {
        let mut buffer = self.complex_buffer(real, imag)?;
        self.forward_in_place(&mut buffer);
        Ok(FrequencyPair::from_complex(&buffer))
    }

    /// Inverse transform of a full-length pair.
    pub fn inverse(&self, pair: &FrequencyPair) -> Result<FrequencyPair> {
        check_len("ifft input", self.len, pair.len())?;
        let mut buffer = pair.to_complex();
        self.inverse_in_place(&mut buffer);
        Ok(FrequencyPair::from_complex(&buffer))
    }

    fn complex_buffer(&self, real: &[f64], imag: Option<&[f64]>) -> Result<Vec<Complex64>> {
        let re = padded("fft real input", real, self.len)?;
        let im = match imag {
            Some(imag) => {
                check_len("fft imaginary input", real.len(), imag.len())?;
                padded("fft imaginary input", imag, self.len)?
            }
            None => vec![0.0; self.len],
        };
        Ok(re
            .into_iter()
            .zip(im)
            .map(|(re, im)| Complex64::new(re, im))
            .collect())
    }
}

/// Computes the complex FFT of `(real, imag)`; `imag == None` is a zero vector.
/// `length` must be a power of two; shorter inputs are zero-padded.
pub fn fft(real: &[f64], imag: Option<&[f64]>, length: usize) -> Result<FrequencyPair> {
    FftPlan::new(length)?.forward(real, imag)
}

/// Computes the inverse FFT of `(real, imag)` (scaled by `1/length`).
pub fn ifft(real: &[f64], imag: &[f64], length: usize) -> Result<FrequencyPair> {
    check_len("ifft input", real.len(), imag.len())?;
    let plan = FftPlan::new(length)?;
    let pair = FrequencyPair::new(
        Array1::from(padded("ifft real input", real, length)?),
        Array1::from(padded("ifft imaginary input", imag, length)?),
    )?;
    plan.inverse(&pair)
}

/// Real-input forward plan for one power-of-two length, shareable across threads.
#[derive(Clone)]
pub struct RealFftPlan {
    len: usize,
    plan: Arc<dyn RealToComplex<f64>>,
}

impl std::fmt::Debug for RealFftPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealFftPlan").field("len", &self.len).finish()
    }
}

impl RealFftPlan {
    pub fn new(len: usize) -> Result<Self> {
        ensure_power_of_two(len)?;
        Ok(Self {
            len,
            plan: RealFftPlanner::<f64>::new().plan_fft_forward(len),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Half spectrum (`len / 2 + 1` bins) of `input` zero-padded to the plan length.
    pub fn process(&self, input: &[f64]) -> Result<Array1<Complex64>> {
        let mut buffer = padded("real fft input", input, self.len)?;
        let mut output = self.plan.make_output_vec();
        self.plan
            .process(&mut buffer, &mut output)
            .map_err(|e| AnalysisError::InvalidConfig(format!("real FFT failed: {e}")))?;
        Ok(Array1::from(output))
    }
}

/// Computes the Fast Fourier Transform of a real-valued signal.
/// Returns the non-negative half spectrum (`length / 2 + 1` bins), identical
/// to the first half of `fft(input, None, length)`.
pub fn real_fft(input: &[f64], length: usize) -> Result<Array1<Complex64>> {
    RealFftPlan::new(length)?.process(input)
}

/// Sample frequencies for a full FFT of `n` points spaced `dt` seconds:
/// `[0, 1, ..., n/2-1, -n/2, ..., -1] / (n·dt)` (odd `n`: up to `(n-1)/2`).
pub fn fftfreq(n: usize, dt: f64) -> Array1<f64> {
    if n == 0 {
        return Array1::zeros(0);
    }
    let scale = 1.0 / (n as f64 * dt);
    let positive = (n - 1) / 2 + 1;
    Array1::from_shape_fn(n, |i| {
        if i < positive {
            i as f64 * scale
        } else {
            -((n - i) as f64) * scale
        }
    })
}

/// Non-negative frequencies of a real FFT of `n` points: `n/2 + 1` bins.
pub fn rfftfreq(n: usize, dt: f64) -> Array1<f64> {
    if n == 0 {
        return Array1::zeros(0);
    }
    let scale = 1.0 / (n as f64 * dt);
    Array1::from_shape_fn(n / 2 + 1, |i| i as f64 * scale)
}


// src/data_analysis/fft_utils.rs
