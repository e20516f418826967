// tests/pipeline_scenarios.rs

use ndarray::{s, Array1, Array2};
use pid_trace_analyzer::constants::P_SCALE;
use pid_trace_analyzer::data_analysis::step_response::{low_high_mask, movement_mask};
use pid_trace_analyzer::data_analysis::wiener::WienerDeconvolution;
use pid_trace_analyzer::data_input::log_data::LogRowData;
use pid_trace_analyzer::{AnalyzerConfig, TelemetrySeries, TelemetrySession, TraceAnalyzer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const RATE: f64 = 1000.0;
const TAU_S: f64 = 0.02;

/// Two cascaded first-order lags with time constant `TAU_S`.
fn plant(input: &Array1<f64>) -> Array1<f64> {
    let alpha = (1.0 / RATE) / (TAU_S + 1.0 / RATE);
    let (mut y1, mut y2) = (0.0, 0.0);
    input.mapv(|u| {
        y1 += alpha * (u - y1);
        y2 += alpha * (y1 - y2);
        y2
    })
}

fn unit_step(len: usize) -> Array1<f64> {
    plant(&Array1::ones(len))
}

fn noise(n: usize, amplitude: f64, seed: u64) -> Array1<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array1::from_shape_fn(n, |_| rng.random_range(-amplitude..amplitude))
}

fn scenario_config() -> AnalyzerConfig {
    let mut config = AnalyzerConfig::for_sample_rate(RATE);
    config.window_size = 2048;
    config.overlap = 0.9375;
    config.response_len = 300;
    config.taper_alpha = 0.0;
    config.cut_freq = 100.0;
    config.equalize_time = false;
    config
}

fn series_for(input: Array1<f64>) -> TelemetrySeries {
    let n = input.len();
    let gyro = plant(&input);
    let time = Array1::from_shape_fn(n, |i| i as f64 / RATE);
    let throttle = Array1::from_shape_fn(n, |i| 30.0 + 40.0 * i as f64 / n as f64);
    TelemetrySeries::new(time, input, gyro, throttle).unwrap()
}

fn max_abs_error(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

#[test]
fn test_recovers_known_plant_step_response() {
    let analyzer = TraceAnalyzer::new(scenario_config()).unwrap();
    let analysis = analyzer.analyze_axis(&series_for(noise(20_000, 200.0, 7)), None).unwrap();

    assert_eq!(analysis.window_count, 141);
    assert_eq!(analysis.rejected_windows, 0);
    assert_eq!(analysis.masks.movement.sum(), 141.0);
    assert!(analysis.high.is_none());

    let combined = analysis.combined.expect("combined curve");
    let expected = unit_step(300);
    let error = max_abs_error(&combined.curve.values, &expected);
    assert!(error < 0.06, "max deviation from simulated step {}", error);

    let metrics = combined.metrics.expect("metrics");
    assert!((metrics.steady_state - 1.0).abs() < 0.05);
    assert!(metrics.overshoot_percent < 10.0);
    // Two 20 ms lags: 50% at roughly 1.68·tau.
    let delay = metrics.delay_s.expect("delay");
    assert!((delay - 0.0336).abs() < 0.006, "delay {}", delay);

    let heatmap = analysis.response_heatmap.expect("response heatmap");
    assert_eq!(heatmap.counts.sum(), 141.0);
}

#[test]
fn test_silent_log_stays_finite() {
    let n = 6000;
    let zeros = Array1::<f64>::zeros(n);
    let series = TelemetrySeries::new(
        Array1::from_shape_fn(n, |i| i as f64 / RATE),
        zeros.clone(),
        zeros.clone(),
        zeros,
    )
    .unwrap();
    let analyzer = TraceAnalyzer::new(scenario_config()).unwrap();
    let analysis = analyzer.analyze_axis(&series, None).unwrap();

    assert!(analysis.window_count > 0);
    assert!(analysis.response.step_response.iter().all(|&v| v == 0.0));
    assert!(analysis.masks.movement.iter().all(|&m| m == 0.0));
    assert!(analysis.combined.is_none());
    let noise = analysis.noise.expect("noise analysis");
    assert!(noise.gyro.heatmap.normalized.iter().all(|v| v.is_finite()));

    let engine = WienerDeconvolution::new(1.0 / RATE, 0.5).unwrap();
    let silent = Array2::<f64>::zeros((4, 512));
    let result = engine.deconvolve(&silent, &silent, 25.0).unwrap();
    assert!(result.data.iter().all(|&v| v == 0.0));
}

#[test]
fn test_low_high_split_masks() {
    let max_input = Array1::from(vec![
        10.0, 600.0, 80.0, 900.0, 300.0, 700.0, 5.0, 100.0, 501.0, 650.0, 720.0, 880.0, 510.0, 990.0, 40.0,
    ]);
    let split = low_high_mask(&max_input, 500.0);
    assert_eq!(
        split.low.to_vec(),
        vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]
    );
    // Nine high windows are too few to stand alone.
    assert!(!split.has_high());
    assert!(split.high.iter().all(|&m| m == 0.0));

    let moving = movement_mask(&max_input, 20.0);
    assert_eq!(
        moving.to_vec(),
        vec![0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
    );
}

#[test]
fn test_gentle_and_hard_flying_both_recover_the_plant() {
    let mut input = noise(20_000, 100.0, 3);
    let hard = noise(10_000, 800.0, 4);
    input.slice_mut(s![10_000..]).assign(&hard);

    let analyzer = TraceAnalyzer::new(scenario_config()).unwrap();
    let analysis = analyzer.analyze_axis(&series_for(input), None).unwrap();

    assert!(analysis.masks.low.sum() >= 60.0);
    assert!(analysis.masks.high.sum() >= 60.0);
    for curve in [analysis.low, analysis.high] {
        let curve = curve.expect("split curve");
        let metrics = curve.metrics.expect("metrics");
        assert!((metrics.steady_state - 1.0).abs() < 0.1, "steady state {}", metrics.steady_state);
    }
}

#[test]
fn test_session_reconstructs_loop_input_from_p_term() {
    let n = 20_000;
    let p_gain = 45.0;
    let input = noise(n, 200.0, 21);
    let gyro = plant(&input);
    let rows: Vec<LogRowData> = (0..n)
        .map(|i| {
            let p_term = (input[i] - gyro[i]) * P_SCALE * p_gain;
            LogRowData {
                time_us: Some(i as f64 * 1000.0),
                p_term: [Some(p_term), None, None],
                gyro: [Some(gyro[i]), Some(0.0), Some(0.0)],
                throttle: Some(55.0),
                debug: [None; 4],
            }
        })
        .collect();
    let session = TelemetrySession::from_rows(&rows, None, [Some(p_gain), None, Some(p_gain)]);
    assert!(session.sample_rate.is_some_and(|rate| (rate - RATE).abs() < 1.0));

    let mut config = scenario_config();
    config.equalize_time = true;
    let analyzer = TraceAnalyzer::new(config).unwrap();
    let [roll, pitch, yaw] = analyzer.analyze_session(&session);

    let roll = roll.expect("roll analysis");
    let combined = roll.combined.expect("roll curve");
    let error = max_abs_error(&combined.curve.values, &unit_step(300));
    assert!(error < 0.06, "max deviation from simulated step {}", error);

    // Without a P gain the logged P-term is not a loop input.
    assert!(pitch.is_none());

    // Yaw has a gain but no P-term samples: all of its windows are rejected.
    let yaw = yaw.expect("yaw analysis");
    assert_eq!(yaw.rejected_windows, yaw.window_count);
    assert!(yaw.combined.is_none());
}

// tests/pipeline_scenarios.rs
