//! Recovery policies for a training job that died after training began.
//!
//! Two modes: wait for the full device complement to return and restart
//! unchanged, or re-plan the parallelism layout for whatever devices remain
//! and restart with rewritten flags. Layout planning can be delegated to an
//! external recovery command or handled by the built-in planner.

use std::time::Duration;

use vigil_core::error::CoreError;
use vigil_core::nvidia_smi;
use vigil_core::reshard;
use vigil_core::traincmd::{TrainingCommand, FLAG_PIPELINE_PARALLEL, FLAG_TENSOR_PARALLEL};

/// How the supervisor reacts to a hardware-attributed training death.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMode {
    /// Poll until the device count returns to the startup count, then
    /// restart the command unchanged.
    WaitForFullRecovery,
    /// Re-plan the layout for the current device count and restart with
    /// rewritten parallelism flags.
    ReshardOnRecovery,
}

impl RecoveryMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wait-for-full-recovery" => Some(RecoveryMode::WaitForFullRecovery),
            "reshard-on-recovery" => Some(RecoveryMode::ReshardOnRecovery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryMode::WaitForFullRecovery => "wait-for-full-recovery",
            RecoveryMode::ReshardOnRecovery => "reshard-on-recovery",
        }
    }
}

/// Errors that abort a recovery attempt.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("device count did not return to {expected} within {waited_secs}s")]
    WaitTimeout { expected: u32, waited_secs: u64 },

    #[error("recovery command {command:?} failed to run: {source}")]
    CommandFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("recovery command {command:?} exited with {exit_code:?}: {stderr}")]
    CommandExited {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Poll the device count until it returns to `expected`.
///
/// Bounded: sleeps `poll_interval` between probes and escalates with
/// [`RecoveryError::WaitTimeout`] once `max_wait` has elapsed, rather than
/// spinning indefinitely on a cluster that may never heal on its own.
pub async fn wait_for_full_recovery(
    expected: u32,
    poll_interval: Duration,
    max_wait: Duration,
) -> Result<(), RecoveryError> {
    let deadline = tokio::time::Instant::now() + max_wait;
    loop {
        let count = nvidia_smi::device_count().await;
        if count == expected {
            tracing::info!(count, "all devices back online");
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(RecoveryError::WaitTimeout {
                expected,
                waited_secs: max_wait.as_secs(),
            });
        }
        tracing::info!(count, expected, "waiting for devices to come back");
        tokio::time::sleep(poll_interval).await;
    }
}

/// Parse an external recovery command's stdout: exactly two
/// whitespace-separated integers, "<tensor> <pipeline>".
pub fn parse_layout_output(stdout: &str) -> Result<(u32, u32), CoreError> {
    let malformed = || CoreError::MalformedRecoveryOutput(stdout.trim().to_string());

    let tokens: Vec<&str> = stdout.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(malformed());
    }
    let tensor = tokens[0].parse::<u32>().map_err(|_| malformed())?;
    let pipeline = tokens[1].parse::<u32>().map_err(|_| malformed())?;
    Ok((tensor, pipeline))
}

/// Run the external recovery command (no arguments) and parse its output.
async fn external_layout(command: &str) -> Result<(u32, u32), RecoveryError> {
    let output = tokio::process::Command::new(command)
        .output()
        .await
        .map_err(|source| RecoveryError::CommandFailed {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(RecoveryError::CommandExited {
            command: command.to_string(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_layout_output(&stdout)?)
}

/// Decide the new tensor/pipeline degrees and rewrite the training
/// command's parallelism flags in place.
///
/// `desired` is the layout recorded at launch, before any rewrite --
/// repeated recoveries keep converging toward the original request, not
/// toward the previous emergency layout.
pub async fn replan_parallelism(
    command: &mut TrainingCommand,
    desired: (u32, u32),
    recovery_command: Option<&str>,
) -> Result<(u32, u32), RecoveryError> {
    let (tensor, pipeline) = match recovery_command {
        Some(rc) => {
            let layout = external_layout(rc).await?;
            tracing::info!(
                tensor = layout.0,
                pipeline = layout.1,
                command = rc,
                "external recovery command chose layout",
            );
            layout
        }
        None => {
            let shape = command.model_shape()?;
            let device_count = nvidia_smi::device_count().await;
            let plan = reshard::plan_parallelism(desired.0, desired.1, shape, device_count)?;
            tracing::info!(
                tensor = plan.tensor,
                pipeline = plan.pipeline,
                data = plan.data,
                device_count,
                "planned new parallelism layout",
            );
            (plan.tensor, plan.pipeline)
        }
    };

    command.set(FLAG_TENSOR_PARALLEL, &tensor.to_string());
    command.set(FLAG_PIPELINE_PARALLEL, &pipeline.to_string());
    Ok((tensor, pipeline))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn mode_parses_both_variants() {
        assert_eq!(
            RecoveryMode::parse("wait-for-full-recovery"),
            Some(RecoveryMode::WaitForFullRecovery)
        );
        assert_eq!(
            RecoveryMode::parse("reshard-on-recovery"),
            Some(RecoveryMode::ReshardOnRecovery)
        );
        assert_eq!(RecoveryMode::parse("reboot"), None);
    }

    #[test]
    fn mode_round_trips_through_as_str() {
        for mode in [
            RecoveryMode::WaitForFullRecovery,
            RecoveryMode::ReshardOnRecovery,
        ] {
            assert_eq!(RecoveryMode::parse(mode.as_str()), Some(mode));
        }
    }

    #[test]
    fn layout_output_accepts_two_integers() {
        assert_eq!(parse_layout_output("2 4\n").unwrap(), (2, 4));
        assert_eq!(parse_layout_output("  1\t8  ").unwrap(), (1, 8));
    }

    #[test]
    fn layout_output_rejects_wrong_token_counts() {
        assert_matches!(
            parse_layout_output("2"),
            Err(CoreError::MalformedRecoveryOutput(_))
        );
        assert_matches!(
            parse_layout_output("2 4 1"),
            Err(CoreError::MalformedRecoveryOutput(_))
        );
        assert_matches!(
            parse_layout_output(""),
            Err(CoreError::MalformedRecoveryOutput(_))
        );
    }

    #[test]
    fn layout_output_rejects_non_integers() {
        assert_matches!(
            parse_layout_output("two four"),
            Err(CoreError::MalformedRecoveryOutput(_))
        );
        assert_matches!(
            parse_layout_output("2 -4"),
            Err(CoreError::MalformedRecoveryOutput(_))
        );
    }
}
