// src/data_input/mod.rs

pub mod log_data;
pub mod telemetry;

// src/data_input/mod.rs
