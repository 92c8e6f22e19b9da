//! Per-GPU telemetry snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One telemetry reading for a single GPU. Immutable once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSample {
    /// Device index as reported by the driver (stable across samples).
    pub device_id: u32,
    /// Product name, e.g. "NVIDIA A100-SXM4-40GB".
    pub name: String,
    pub driver_version: String,
    pub temperature_c: f64,
    pub power_draw_w: f64,
    /// Compute utilization (0-100).
    pub gpu_utilization_pct: f64,
    /// Memory-controller utilization (0-100).
    pub memory_utilization_pct: f64,
    pub memory_used_mb: f64,
    pub memory_total_mb: f64,
    /// ECC error reporting is not available on all GPUs; defaults to 0.
    pub error_count: u32,
    pub timestamp: DateTime<Utc>,
}
