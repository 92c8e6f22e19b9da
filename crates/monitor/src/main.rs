//! `vigil-monitor` -- GPU health monitoring daemon.
//!
//! Samples per-GPU telemetry via `nvidia-smi` on a fixed interval, scores
//! each device's failure risk against its recent history, appends every
//! sample to a CSV telemetry log, and arms a checkpoint trigger file when
//! the risk crosses the alert threshold. Runs as a sibling process of
//! `vigil-supervisor`; the two communicate only through the filesystem.
//!
//! # Environment variables
//!
//! | Variable                            | Required | Default                             | Description                             |
//! |-------------------------------------|----------|-------------------------------------|-----------------------------------------|
//! | `VIGIL_TELEMETRY_LOG`               | no       | `vigil_logs/gpu_metrics.csv`        | Append-only CSV telemetry log           |
//! | `VIGIL_TRIGGER_PATH`                | no       | `vigil_logs/trigger_checkpoint.flag`| Recovery trigger marker path            |
//! | `VIGIL_SAMPLE_INTERVAL_SECS`        | no       | `10`                                | Seconds between sampling cycles         |
//! | `VIGIL_HISTORY_WINDOW`              | no       | `60`                                | Samples retained per device             |
//! | `VIGIL_ALERT_TEMPERATURE`           | no       | `85`                                | Temperature alert threshold (°C)        |
//! | `VIGIL_ALERT_MEMORY_UTILIZATION`    | no       | `95`                                | Memory utilization alert threshold (%)  |
//! | `VIGIL_ALERT_POWER_FLUCTUATION_PCT` | no       | `15`                                | Power fluctuation alert threshold (%)   |
//! | `VIGIL_ALERT_UTILIZATION_DROP`      | no       | `30`                                | Utilization drop alert threshold (pts)  |
//! | `VIGIL_ALERT_TEMPERATURE_RISE_RATE` | no       | `5`                                 | Temperature rise alert rate (°C/min)    |

use std::path::PathBuf;
use std::time::Duration;

use vigil_core::history::DEFAULT_HISTORY_WINDOW;
use vigil_core::nvidia_smi;
use vigil_core::risk::AlertThresholds;
use vigil_core::trigger::DEFAULT_TRIGGER_PATH;
use vigil_monitor::recorder::TelemetryRecorder;
use vigil_monitor::sampler::Sampler;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default interval between sampling cycles.
const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Default telemetry log location.
const DEFAULT_TELEMETRY_LOG: &str = "vigil_logs/gpu_metrics.csv";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_monitor=info,vigil_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let interval_secs = env_parsed("VIGIL_SAMPLE_INTERVAL_SECS", DEFAULT_INTERVAL_SECS);
    let history_window = env_parsed("VIGIL_HISTORY_WINDOW", DEFAULT_HISTORY_WINDOW);
    let telemetry_log =
        std::env::var("VIGIL_TELEMETRY_LOG").unwrap_or_else(|_| DEFAULT_TELEMETRY_LOG.into());
    let trigger_path = PathBuf::from(
        std::env::var("VIGIL_TRIGGER_PATH").unwrap_or_else(|_| DEFAULT_TRIGGER_PATH.into()),
    );
    let thresholds = thresholds_from_env();

    tracing::info!(
        interval_secs,
        history_window,
        telemetry_log = %telemetry_log,
        trigger_path = %trigger_path.display(),
        "Starting vigil-monitor",
    );

    let recorder = match TelemetryRecorder::create(&telemetry_log) {
        Ok(recorder) => recorder,
        Err(e) => {
            tracing::error!(error = %e, path = %telemetry_log, "failed to create telemetry log");
            std::process::exit(1);
        }
    };

    let gpu_count = nvidia_smi::device_count().await;
    tracing::info!(gpu_count, "GPU detection complete");

    let mut sampler = Sampler::new(
        Duration::from_secs(interval_secs),
        thresholds,
        history_window,
        recorder,
        trigger_path,
    );
    sampler.run().await;
}

/// Read an env var and parse it, falling back to `default` when unset or
/// unparseable.
fn env_parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Alert thresholds from the environment, defaulting per field.
fn thresholds_from_env() -> AlertThresholds {
    let defaults = AlertThresholds::default();
    AlertThresholds {
        temperature_c: env_parsed("VIGIL_ALERT_TEMPERATURE", defaults.temperature_c),
        memory_utilization_pct: env_parsed(
            "VIGIL_ALERT_MEMORY_UTILIZATION",
            defaults.memory_utilization_pct,
        ),
        power_fluctuation_pct: env_parsed(
            "VIGIL_ALERT_POWER_FLUCTUATION_PCT",
            defaults.power_fluctuation_pct,
        ),
        gpu_utilization_drop_pct: env_parsed(
            "VIGIL_ALERT_UTILIZATION_DROP",
            defaults.gpu_utilization_drop_pct,
        ),
        temperature_rise_rate: env_parsed(
            "VIGIL_ALERT_TEMPERATURE_RISE_RATE",
            defaults.temperature_rise_rate,
        ),
    }
}
