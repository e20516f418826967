// src/lib.rs - Library interface for the trace analysis pipeline

pub mod axis_names;
pub mod config;
pub mod constants;
pub mod data_analysis;
pub mod data_input;
pub mod error;
pub mod trace_analyzer;

pub use axis_names::Axis;
pub use config::{AnalyzerConfig, ModeEstimator};
pub use data_input::telemetry::{TelemetrySeries, TelemetrySession};
pub use error::{AnalysisError, Result};
pub use trace_analyzer::{AxisAnalysis, ResponseCurve, TraceAnalyzer};

