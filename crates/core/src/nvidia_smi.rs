//! `nvidia-smi` shared command wrappers.
//!
//! Two invocation forms: the full per-device metrics query used by the
//! monitor's sampling loop, and the device-count probe consulted before
//! recovery decisions. Absence of the binary, a non-zero exit, or a
//! malformed output line is a recoverable per-call error -- callers log it
//! and carry on with an empty result or a zero count.

use chrono::{DateTime, Utc};

use crate::telemetry::DeviceSample;

/// Error type for `nvidia-smi` invocations.
#[derive(Debug, thiserror::Error)]
pub enum SmiError {
    #[error("nvidia-smi binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("nvidia-smi execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse nvidia-smi output: {0}")]
    ParseError(String),
}

/// Fields requested from `--query-gpu`, in column order. The parser below
/// depends on this ordering.
const QUERY_FIELDS: &str = "index,name,driver_version,temperature.gpu,power.draw,\
                            utilization.gpu,utilization.memory,memory.used,memory.total";

/// Query metrics for every GPU visible on the host.
///
/// One synchronous invocation per call; the returned samples all share one
/// timestamp. An empty vec means the tool reported zero devices.
pub async fn query_devices() -> Result<Vec<DeviceSample>, SmiError> {
    let output = tokio::process::Command::new("nvidia-smi")
        .arg(format!("--query-gpu={QUERY_FIELDS}"))
        .arg("--format=csv,noheader,nounits")
        .output()
        .await
        .map_err(SmiError::NotFound)?;

    if !output.status.success() {
        return Err(SmiError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let now = Utc::now();
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_query_line(line, now))
        .collect()
}

/// Number of GPUs currently visible, by counting `--list-gpus` output lines.
///
/// Any failure (missing binary, non-zero exit) yields 0 -- during a hardware
/// incident the tool itself often becomes unavailable.
pub async fn device_count() -> u32 {
    match tokio::process::Command::new("nvidia-smi")
        .arg("--list-gpus")
        .output()
        .await
    {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count() as u32,
        Ok(output) => {
            tracing::warn!(
                exit_code = ?output.status.code(),
                "nvidia-smi --list-gpus failed; reporting zero devices"
            );
            0
        }
        Err(e) => {
            tracing::warn!(error = %e, "nvidia-smi unavailable; reporting zero devices");
            0
        }
    }
}

/// Parse one `--format=csv,noheader,nounits` output line into a sample.
///
/// Some driver versions suffix power draw with `W` even under `nounits`;
/// the suffix is stripped before parsing.
pub fn parse_query_line(line: &str, timestamp: DateTime<Utc>) -> Result<DeviceSample, SmiError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 9 {
        return Err(SmiError::ParseError(format!(
            "expected 9 fields, got {}: {line:?}",
            fields.len()
        )));
    }

    let device_id = fields[0]
        .parse::<u32>()
        .map_err(|_| SmiError::ParseError(format!("bad device index {:?}", fields[0])))?;

    let power_raw = fields[4].trim_end_matches('W').trim();

    Ok(DeviceSample {
        device_id,
        name: fields[1].to_string(),
        driver_version: fields[2].to_string(),
        temperature_c: parse_f64("temperature.gpu", fields[3])?,
        power_draw_w: parse_f64("power.draw", power_raw)?,
        gpu_utilization_pct: parse_f64("utilization.gpu", fields[5])?,
        memory_utilization_pct: parse_f64("utilization.memory", fields[6])?,
        memory_used_mb: parse_f64("memory.used", fields[7])?,
        memory_total_mb: parse_f64("memory.total", fields[8])?,
        error_count: 0,
        timestamp,
    })
}

fn parse_f64(field: &str, raw: &str) -> Result<f64, SmiError> {
    raw.parse::<f64>()
        .map_err(|_| SmiError::ParseError(format!("bad {field} value {raw:?}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
