// src/constants.rs

// Betaflight P-term scaling: pid_in = gyro + pterm / (P_SCALE * P).
pub const P_SCALE: f64 = 0.032029;

// Sample rate assumed when none is supplied.
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 1000.0;

// Step response windowing.
pub const FRAME_LENGTH_S: f64 = 1.0; // Length of each window in seconds
pub const RESPONSE_LENGTH_S: f64 = 0.5; // Length of the step response to keep from each window
pub const SUPERPOSITION_FACTOR: usize = 16; // Number of overlapping windows within a frame length
pub const TUKEY_ALPHA: f64 = 1.0; // Alpha for the stack taper (1.0 is Hanning window)
pub const DECONVOLUTION_TUKEY_ALPHA: f64 = 0.5; // Edge taper applied inside the Wiener engine

// Wiener deconvolution.
pub const CUT_FREQ_HZ: f64 = 25.0; // Above this the deconvolution is heavily regularized
pub const WIENER_PASSBAND_SN: f64 = 10.0; // Signal-to-noise weight in the pass band (1/sn = 0.1)
pub const WIENER_SN_FLOOR: f64 = 1e-9; // Keeps 1/sn finite above the cutoff
pub const WIENER_CUT_EPSILON: f64 = 1e-9; // Width of the clip window that builds the step in sn

// Constants for splitting windows by input magnitude.
pub const SETPOINT_THRESHOLD: f64 = 500.0; // Threshold for low/high setpoint masking
pub const MOVEMENT_THRESHOLD_DEG_S: f64 = 20.0; // Windows at or below are too quiet to use
pub const MIN_HIGH_INPUT_WINDOWS: usize = 10; // Fewer high-input windows than this disables the high mask

// Response histogram used to extract the representative curve.
pub const RESPONSE_VERT_RANGE: [f64; 2] = [-1.5, 3.5];
pub const RESPONSE_VERT_BINS: usize = 1000;
pub const MODE_SMOOTHING_SIGMA: f64 = 7.0; // Gaussian width (bins) for the smoothed estimator
pub const MODE_BAND_THRESHOLD: f64 = 0.5; // Bucket weight above which a bucket counts toward the band

// Constants for individual window step response quality metrics.
pub const STEADY_STATE_START_S: f64 = 0.2;
pub const STEADY_STATE_END_S: f64 = 0.5;
pub const SETTLING_BAND: f64 = 0.05;

// --- Noise spectrum / heatmap constants ---
pub const NOISE_FRAME_LENGTH_S: f64 = 0.3;
pub const NOISE_SUPERPOSITION_FACTOR: usize = 16;
pub const THROTTLE_BINS: usize = 101;
pub const THROTTLE_RANGE: [f64; 2] = [0.0, 100.0];
pub const HEATMAP_SMOOTHING_SIGMA: f64 = 3.0;
pub const HEATMAP_FREQ_BIN_DIVISOR: usize = 4; // Frequency bins = spectrum length / divisor

// Gaussian kernel truncation (radius = TRUNCATE * sigma + 0.5).
pub const GAUSSIAN_TRUNCATE: f64 = 4.0;

// src/constants.rs
