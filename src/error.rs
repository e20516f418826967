// src/error.rs

//! Error types for the trace analysis pipeline.
//!
//! Shape and configuration problems are caller-contract violations and are
//! reported eagerly. Sparse data ("not enough windows") is an expected
//! condition and is handled by fallbacks in the individual stages instead.

use thiserror::Error;

/// Main error type for analysis operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Rejected configuration value (window size, overlap, bins, cutoff...)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two arrays that must be parallel have different lengths
    #[error("Length mismatch in {context}: expected {expected}, got {actual}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Two matrices that must share a shape do not
    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// FFT length is not a power of two
    #[error("FFT length {0} is not a power of two")]
    NotPowerOfTwo(usize),

    /// Interpolation abscissae are not strictly increasing
    #[error("Sample positions must be strictly increasing: {0}")]
    NotMonotonic(String),

    /// Histogram/mask weight that is negative or not finite
    #[error("Invalid weight {value} at window {index}")]
    InvalidWeight { index: usize, value: f64 },

    /// NaN/Inf survived into a stage output
    #[error("{count} non-finite values in {stage} output")]
    NonFinite { stage: &'static str, count: usize },

    /// Not enough samples to run the requested stage at all
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Fails with [`AnalysisError::LengthMismatch`] unless `actual == expected`.
pub(crate) fn check_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(AnalysisError::LengthMismatch {
            context,
            expected,
            actual,
        })
    }
}

/// Reports (does not clamp) any NaN/Inf left in a stage output.
pub fn ensure_finite<'a, I>(stage: &'static str, values: I) -> Result<()>
where
    I: IntoIterator<Item = &'a f64>,
{
    let count = values.into_iter().filter(|v| !v.is_finite()).count();
    if count == 0 {
        Ok(())
    } else {
        Err(AnalysisError::NonFinite { stage, count })
    }
}
