// src/data_analysis/mod.rs

pub mod fft_utils;
pub mod heatmap;
pub mod interpolation;
pub mod mode_average;
pub mod response_metrics;
pub mod smoothing;
pub mod spectrum;
pub mod stacker;
pub mod step_response;
pub mod wiener;
pub mod window_functions;

// src/data_analysis/mod.rs
