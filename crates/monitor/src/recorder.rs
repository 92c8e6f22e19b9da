//! Append-only CSV telemetry log.
//!
//! One row per (sample, risk score). The header is written once, when the
//! file does not exist yet, so external consumers can tail the file across
//! monitor restarts without seeing repeated headers.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use vigil_core::telemetry::DeviceSample;

/// Column header, written once on first creation.
pub const CSV_HEADER: &str = "timestamp,gpu_id,gpu_name,driver_version,temperature,power_draw,\
                              gpu_utilization,memory_utilization,memory_used,memory_total,\
                              errors,failure_risk";

#[derive(Debug)]
pub struct TelemetryRecorder {
    path: PathBuf,
}

impl TelemetryRecorder {
    /// Open the log at `path`, creating the parent directory and writing
    /// the header row if the file does not exist yet.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            std::fs::write(&path, format!("{CSV_HEADER}\n"))?;
        }
        Ok(Self { path })
    }

    /// Append one row for `sample` with its computed risk score.
    pub fn append(&self, sample: &DeviceSample, risk: f64) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{},{},{:.4}",
            sample.timestamp.to_rfc3339(),
            sample.device_id,
            sample.name,
            sample.driver_version,
            sample.temperature_c,
            sample.power_draw_w,
            sample.gpu_utilization_pct,
            sample.memory_utilization_pct,
            sample.memory_used_mb,
            sample.memory_total_mb,
            sample.error_count,
            risk,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
