// src/data_input/log_data.rs

/// Structure to hold data decoded from a single row of the blackbox log.
/// Uses `Option<f64>` to handle potentially missing or unparseable values.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LogRowData {
    pub time_us: Option<f64>,     // Timestamp (in microseconds).
    pub p_term: [Option<f64>; 3], // Proportional term [Roll, Pitch, Yaw].
    pub gyro: [Option<f64>; 3],   // Gyroscope readings (filtered) [Roll, Pitch, Yaw].
    pub throttle: Option<f64>,    // Throttle in percent.
    pub debug: [Option<f64>; 4],  // Debug values [0..3].
}

// src/data_input/log_data.rs
