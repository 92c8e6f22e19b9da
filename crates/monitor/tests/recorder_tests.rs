//! Integration tests for the CSV telemetry recorder.
//!
//! Verifies one-time header creation, append behavior across reopens, and
//! the row format external consumers parse.

use chrono::{TimeZone, Utc};
use vigil_core::telemetry::DeviceSample;
use vigil_monitor::recorder::{TelemetryRecorder, CSV_HEADER};

fn sample() -> DeviceSample {
    DeviceSample {
        device_id: 2,
        name: "NVIDIA A100-SXM4-40GB".to_string(),
        driver_version: "535.104.05".to_string(),
        temperature_c: 66.0,
        power_draw_w: 310.25,
        gpu_utilization_pct: 97.0,
        memory_utilization_pct: 64.0,
        memory_used_mb: 30104.0,
        memory_total_mb: 40960.0,
        error_count: 0,
        timestamp: Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
    }
}

#[test]
fn header_is_written_once_on_creation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("metrics.csv");

    let recorder = TelemetryRecorder::create(&path).unwrap();
    let content = std::fs::read_to_string(recorder.path()).unwrap();
    assert_eq!(content, format!("{CSV_HEADER}\n"));
}

#[test]
fn append_adds_one_row_per_sample() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.csv");

    let recorder = TelemetryRecorder::create(&path).unwrap();
    recorder.append(&sample(), 0.4).unwrap();
    recorder.append(&sample(), 0.0).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(
        lines[1],
        "2026-03-14T09:26:53+00:00,2,NVIDIA A100-SXM4-40GB,535.104.05,66,310.25,97,64,30104,40960,0,0.4000"
    );
    assert!(lines[2].ends_with(",0.0000"));
}

#[test]
fn reopening_an_existing_log_does_not_repeat_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.csv");

    let recorder = TelemetryRecorder::create(&path).unwrap();
    recorder.append(&sample(), 0.12).unwrap();
    drop(recorder);

    // A monitor restart reopens the same file.
    let recorder = TelemetryRecorder::create(&path).unwrap();
    recorder.append(&sample(), 0.08).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let headers = content.lines().filter(|l| *l == CSV_HEADER).count();
    assert_eq!(headers, 1);
    assert_eq!(content.lines().count(), 3);
}
