//! Sampling loop: collect, score, persist, latch.
//!
//! Runs on the monitor's single sampling task. History mutation and risk
//! computation for a device happen here and nowhere else, so there is no
//! locking; the only cross-process surfaces are the append-only CSV log
//! and the trigger marker, each with exactly one writer.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use vigil_core::history::HistoryMap;
use vigil_core::nvidia_smi;
use vigil_core::risk::{self, AlertThresholds};
use vigil_core::telemetry::DeviceSample;
use vigil_core::trigger;

use crate::recorder::TelemetryRecorder;

/// Delay before the next attempt after a failed collection cycle.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Everything the sampling loop owns: bounded per-device history, alert
/// thresholds, the CSV recorder, and the trigger latch location.
#[derive(Debug)]
pub struct Sampler {
    interval: Duration,
    thresholds: AlertThresholds,
    history: HistoryMap,
    recorder: TelemetryRecorder,
    trigger_path: PathBuf,
}

impl Sampler {
    pub fn new(
        interval: Duration,
        thresholds: AlertThresholds,
        history_window: usize,
        recorder: TelemetryRecorder,
        trigger_path: PathBuf,
    ) -> Self {
        Self {
            interval,
            thresholds,
            history: HistoryMap::new(history_window),
            recorder,
            trigger_path,
        }
    }

    /// Run until Ctrl-C. Collection failures are logged and retried after
    /// a short delay; they never terminate the loop.
    pub async fn run(&mut self) {
        loop {
            let delay = self.cycle().await;
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received, stopping sampling loop");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One sampling cycle. Returns the delay before the next cycle: the
    /// retry delay when collection produced nothing, the configured
    /// sampling interval otherwise.
    async fn cycle(&mut self) -> Duration {
        let samples = match nvidia_smi::query_devices().await {
            Ok(samples) if samples.is_empty() => {
                tracing::error!("telemetry source reported zero devices");
                return RETRY_DELAY;
            }
            Ok(samples) => samples,
            Err(e) => {
                tracing::error!(error = %e, "failed to collect GPU telemetry");
                return RETRY_DELAY;
            }
        };

        for sample in samples {
            let device_id = sample.device_id;
            if let Err(e) = self.record(sample) {
                tracing::error!(device_id, error = %e, "failed to persist telemetry row");
            }
        }

        self.interval
    }

    /// Append a sample to its device history, score the post-append
    /// snapshot, persist the row, and arm the recovery trigger when the
    /// score crosses the threshold. Returns the composite score.
    pub fn record(&mut self, sample: DeviceSample) -> io::Result<f64> {
        let device_id = sample.device_id;
        let history = self.history.record(sample.clone());
        let breakdown = risk::failure_risk(history, &self.thresholds, self.interval);
        let total = breakdown.total();

        if total > risk::BREAKDOWN_WARN_THRESHOLD {
            tracing::warn!(
                device_id,
                risk = total,
                temperature = breakdown.temperature,
                memory = breakdown.memory,
                errors = breakdown.errors,
                power_fluctuation = breakdown.power_fluctuation,
                utilization_drop = breakdown.utilization_drop,
                temperature_rise = breakdown.temperature_rise,
                "elevated failure risk"
            );
        }

        self.recorder.append(&sample, total)?;

        if total >= risk::TRIGGER_THRESHOLD {
            tracing::warn!(device_id, risk = total, "high failure risk detected");
            trigger::arm(&self.trigger_path)?;
            tracing::info!(path = %self.trigger_path.display(), "recovery trigger armed");
        }

        Ok(total)
    }
}
