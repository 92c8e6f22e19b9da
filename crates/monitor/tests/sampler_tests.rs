//! Integration tests for the record path: history append, risk scoring,
//! CSV persistence, and trigger latching.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use vigil_core::risk::AlertThresholds;
use vigil_core::telemetry::DeviceSample;
use vigil_core::trigger;
use vigil_monitor::recorder::TelemetryRecorder;
use vigil_monitor::sampler::Sampler;

const INTERVAL: Duration = Duration::from_secs(10);

fn sample(temperature_c: f64, memory_utilization_pct: f64) -> DeviceSample {
    DeviceSample {
        device_id: 0,
        name: "A100".to_string(),
        driver_version: "535".to_string(),
        temperature_c,
        power_draw_w: 250.0,
        gpu_utilization_pct: 95.0,
        memory_utilization_pct,
        memory_used_mb: 30000.0,
        memory_total_mb: 40960.0,
        error_count: 0,
        timestamp: Utc::now(),
    }
}

fn sampler_in(dir: &std::path::Path) -> (Sampler, PathBuf) {
    let csv_path = dir.join("metrics.csv");
    let trigger_path = dir.join("trigger.flag");
    let recorder = TelemetryRecorder::create(&csv_path).unwrap();
    let sampler = Sampler::new(
        INTERVAL,
        AlertThresholds::default(),
        60,
        recorder,
        trigger_path.clone(),
    );
    (sampler, trigger_path)
}

#[test]
fn healthy_sample_is_recorded_without_arming_the_trigger() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sampler, trigger_path) = sampler_in(dir.path());

    let risk = sampler.record(sample(60.0, 50.0)).unwrap();
    assert_eq!(risk, 0.0);
    assert!(!trigger::is_armed(&trigger_path));

    let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
    assert_eq!(csv.lines().count(), 2); // header + one row
}

#[test]
fn overheating_device_arms_the_trigger() {
    // 90 °C with 96% memory utilization saturates the temperature and
    // memory factors: 0.25 + 0.15 = 0.40, well over the 0.10 threshold.
    let dir = tempfile::tempdir().unwrap();
    let (mut sampler, trigger_path) = sampler_in(dir.path());

    let risk = sampler.record(sample(90.0, 96.0)).unwrap();
    assert!((risk - 0.40).abs() < 1e-12);
    assert!(trigger::is_armed(&trigger_path));
}

#[test]
fn qualifying_cycles_rearm_the_trigger_after_consumption() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sampler, trigger_path) = sampler_in(dir.path());

    sampler.record(sample(90.0, 96.0)).unwrap();
    assert!(trigger::is_armed(&trigger_path));

    // The external checkpoint agent consumes the marker...
    std::fs::remove_file(&trigger_path).unwrap();

    // ...and the next qualifying cycle arms it again.
    sampler.record(sample(91.0, 96.0)).unwrap();
    assert!(trigger::is_armed(&trigger_path));
}

#[test]
fn risk_rows_accumulate_per_device_history() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sampler, _) = sampler_in(dir.path());

    for t in [60.0, 62.0, 64.0, 66.0, 68.0, 70.0] {
        sampler.record(sample(t, 50.0)).unwrap();
    }

    // Six samples rising 10 °C over the window crosses the rise-rate
    // precondition; the final row carries a non-zero score.
    let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
    let last = csv.lines().last().unwrap();
    let risk: f64 = last.rsplit(',').next().unwrap().parse().unwrap();
    assert!(risk > 0.0);
}
