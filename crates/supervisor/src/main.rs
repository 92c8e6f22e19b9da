//! `vigil-supervisor` -- training job lifecycle daemon.
//!
//! Launches the training command and the GPU health monitor as separate
//! process groups, polls training liveness, and reacts to crashes: clean
//! completion shuts everything down, a crash before training started is
//! surfaced as a configuration failure, and a crash mid-training runs the
//! configured hardware-recovery policy before relaunching.
//!
//! # Environment variables
//!
//! | Variable                            | Required | Default                  | Description                                        |
//! |-------------------------------------|----------|--------------------------|----------------------------------------------------|
//! | `VIGIL_TRAIN_CMD`                   | yes      | --                       | Training command, `<program> --flag [value] ...`   |
//! | `VIGIL_TRAIN_LOG`                   | no       | `vigil_logs/train_run.log` | Training log path (scanned for sentinels)        |
//! | `VIGIL_MONITOR_CMD`                 | no       | `vigil-monitor`          | Command that launches the health monitor           |
//! | `VIGIL_RECOVERY_MODE`               | no       | `wait-for-full-recovery` | `wait-for-full-recovery` or `reshard-on-recovery`  |
//! | `VIGIL_RECOVERY_CMD`                | no       | --                       | External layout planner (prints "<tensor> <pipeline>") |
//! | `VIGIL_POLL_INTERVAL_SECS`          | no       | `5`                      | Seconds between liveness checks                    |
//! | `VIGIL_RECOVERY_POLL_INTERVAL_SECS` | no       | `10`                     | Seconds between device-count probes during recovery |
//! | `VIGIL_RECOVERY_MAX_WAIT_SECS`      | no       | `1800`                   | Give up on full recovery after this long           |

use std::path::PathBuf;
use std::time::Duration;

use vigil_supervisor::recovery::RecoveryMode;
use vigil_supervisor::supervisor::{Outcome, Supervisor, SupervisorConfig};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_TRAIN_LOG: &str = "vigil_logs/train_run.log";
const DEFAULT_MONITOR_CMD: &str = "vigil-monitor";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_RECOVERY_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_RECOVERY_MAX_WAIT_SECS: u64 = 1800;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_supervisor=info,vigil_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let train_cmd = std::env::var("VIGIL_TRAIN_CMD").unwrap_or_else(|_| {
        tracing::error!("VIGIL_TRAIN_CMD environment variable is required");
        std::process::exit(1);
    });

    let recovery_mode = match std::env::var("VIGIL_RECOVERY_MODE") {
        Ok(raw) => RecoveryMode::parse(&raw).unwrap_or_else(|| {
            tracing::error!(
                value = %raw,
                "VIGIL_RECOVERY_MODE must be wait-for-full-recovery or reshard-on-recovery",
            );
            std::process::exit(1);
        }),
        Err(_) => RecoveryMode::WaitForFullRecovery,
    };

    let config = SupervisorConfig {
        train_cmd,
        train_log: PathBuf::from(
            std::env::var("VIGIL_TRAIN_LOG").unwrap_or_else(|_| DEFAULT_TRAIN_LOG.into()),
        ),
        monitor_cmd: std::env::var("VIGIL_MONITOR_CMD")
            .unwrap_or_else(|_| DEFAULT_MONITOR_CMD.into()),
        recovery_mode,
        recovery_cmd: std::env::var("VIGIL_RECOVERY_CMD").ok(),
        poll_interval: Duration::from_secs(env_parsed(
            "VIGIL_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )),
        recovery_poll_interval: Duration::from_secs(env_parsed(
            "VIGIL_RECOVERY_POLL_INTERVAL_SECS",
            DEFAULT_RECOVERY_POLL_INTERVAL_SECS,
        )),
        recovery_max_wait: Duration::from_secs(env_parsed(
            "VIGIL_RECOVERY_MAX_WAIT_SECS",
            DEFAULT_RECOVERY_MAX_WAIT_SECS,
        )),
    };

    tracing::info!(
        recovery_mode = config.recovery_mode.as_str(),
        train_log = %config.train_log.display(),
        "Starting vigil-supervisor",
    );

    let mut supervisor = match Supervisor::launch(config).await {
        Ok(supervisor) => supervisor,
        Err(e) => {
            tracing::error!(error = %e, "failed to launch supervised processes");
            std::process::exit(1);
        }
    };

    match supervisor.run().await {
        Ok(Outcome::Completed) => {
            tracing::info!("training finished successfully");
        }
        Ok(Outcome::Interrupted) => {
            tracing::info!("shutdown complete");
        }
        Err(e) => {
            tracing::error!(error = %e, "supervisor failed");
            std::process::exit(1);
        }
    }
}

/// Read an env var and parse it, falling back to `default` when unset or
/// unparseable.
fn env_parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
