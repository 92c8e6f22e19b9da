//! Training lifecycle state machine.
//!
//! Owns both child process groups (training job and monitor), polls
//! training liveness on a bounded sleep, and on death scans the full
//! training log before deciding between completion, a fatal pre-start
//! failure, and hardware recovery.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use vigil_core::error::CoreError;
use vigil_core::nvidia_smi;
use vigil_core::traincmd::TrainingCommand;

use crate::process::ManagedProcess;
use crate::recovery::{self, RecoveryError, RecoveryMode};
use crate::sentinel::{self, LogProgress};
use crate::state::{self, TrainingState};

/// Supervisor settings, resolved by the binary from the environment.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// The user's training command line, `<program> --flag [value] ...`.
    pub train_cmd: String,
    /// Where the training job's combined output lands.
    pub train_log: PathBuf,
    /// Command that launches the monitor sibling.
    pub monitor_cmd: String,
    pub recovery_mode: RecoveryMode,
    /// External layout planner; the built-in planner runs when unset.
    pub recovery_cmd: Option<String>,
    /// Sleep between liveness checks.
    pub poll_interval: Duration,
    /// Sleep between device-count probes while waiting for full recovery.
    pub recovery_poll_interval: Duration,
    /// Give up waiting for full recovery after this long.
    pub recovery_max_wait: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to launch {what}: {source}")]
    Launch {
        what: &'static str,
        source: io::Error,
    },

    #[error("failed to poll training process: {0}")]
    Poll(#[from] io::Error),

    #[error("training process exited before training started; this is not a hardware failure -- check {log} for details")]
    FailedBeforeStart { log: String },

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Why the supervisor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The training log carried the finished sentinel.
    Completed,
    /// An external interrupt asked for shutdown.
    Interrupted,
}

#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    command: TrainingCommand,
    /// Tensor/pipeline degrees requested at launch, before any rewrite.
    desired: (u32, u32),
    /// Device count observed at launch; full recovery means returning here.
    startup_device_count: u32,
    training: ManagedProcess,
    monitor: ManagedProcess,
    state: TrainingState,
}

impl Supervisor {
    /// Parse the training command, record the requested layout and device
    /// count, and launch the training and monitor process groups.
    pub async fn launch(config: SupervisorConfig) -> Result<Self, SupervisorError> {
        let command = TrainingCommand::parse(&config.train_cmd)?;
        let desired = command.parallel_degrees()?;
        let startup_device_count = nvidia_smi::device_count().await;

        tracing::info!(
            tensor = desired.0,
            pipeline = desired.1,
            devices = startup_device_count,
            "recorded requested parallelism layout",
        );

        if let Some(parent) = config.train_log.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| SupervisorError::Launch {
                    what: "training log directory",
                    source,
                })?;
            }
        }

        let training = ManagedProcess::spawn(
            "training",
            &training_shell_command(&command, &config.train_log),
        )
        .map_err(|source| SupervisorError::Launch {
            what: "training process",
            source,
        })?;
        tracing::info!(command = %command.to_command_line(), "training job launched");

        let monitor =
            ManagedProcess::spawn("monitor", &config.monitor_cmd).map_err(|source| {
                SupervisorError::Launch {
                    what: "monitor process",
                    source,
                }
            })?;

        Ok(Self {
            config,
            command,
            desired,
            startup_device_count,
            training,
            monitor,
            state: TrainingState::Running,
        })
    }

    /// Drive the poll loop to its end. Both process groups are terminated
    /// on every exit path, including errors.
    pub async fn run(&mut self) -> Result<Outcome, SupervisorError> {
        let result = self.poll_loop().await;
        if result.is_err() {
            self.shutdown();
        }
        result
    }

    async fn poll_loop(&mut self) -> Result<Outcome, SupervisorError> {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received, shutting down");
                    self.shutdown();
                    return Ok(Outcome::Interrupted);
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if self.training.is_alive()? {
                        continue;
                    }
                    if let Some(outcome) = self.handle_training_exit().await? {
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    /// React to a dead training process. `Ok(None)` means the job was
    /// restarted and polling continues.
    async fn handle_training_exit(&mut self) -> Result<Option<Outcome>, SupervisorError> {
        let progress = match sentinel::scan_log(&self.config.train_log) {
            Ok(progress) => progress,
            Err(e) => {
                // A job that never produced its log never started training.
                tracing::warn!(
                    error = %e,
                    log = %self.config.train_log.display(),
                    "could not read training log after exit",
                );
                LogProgress::None
            }
        };

        self.state = state::classify_exit(progress);
        tracing::warn!(state = %self.state, "training process exited");

        match progress {
            LogProgress::Finished => {
                tracing::info!("training finished; terminating monitor");
                self.monitor.terminate_group();
                Ok(Some(Outcome::Completed))
            }
            LogProgress::None => Err(SupervisorError::FailedBeforeStart {
                log: self.config.train_log.display().to_string(),
            }),
            LogProgress::Started => {
                self.recover().await?;
                Ok(None)
            }
        }
    }

    /// Run the configured recovery policy, then restart the training job.
    async fn recover(&mut self) -> Result<(), SupervisorError> {
        tracing::warn!(
            mode = self.config.recovery_mode.as_str(),
            "training died after start; treating as hardware failure",
        );

        match self.config.recovery_mode {
            RecoveryMode::WaitForFullRecovery => {
                recovery::wait_for_full_recovery(
                    self.startup_device_count,
                    self.config.recovery_poll_interval,
                    self.config.recovery_max_wait,
                )
                .await?;
                tracing::info!("restarting training with the original layout");
            }
            RecoveryMode::ReshardOnRecovery => {
                let (tensor, pipeline) = recovery::replan_parallelism(
                    &mut self.command,
                    self.desired,
                    self.config.recovery_cmd.as_deref(),
                )
                .await?;
                tracing::info!(tensor, pipeline, "restarting training with resharded layout");
            }
        }

        let shell = training_shell_command(&self.command, &self.config.train_log);
        self.training =
            ManagedProcess::spawn("training", &shell).map_err(|source| SupervisorError::Launch {
                what: "training process",
                source,
            })?;
        self.state = TrainingState::Running;
        tracing::info!(command = %self.command.to_command_line(), "training job relaunched");
        Ok(())
    }

    /// Terminate both owned process groups.
    pub fn shutdown(&mut self) {
        self.training.terminate_group();
        self.monitor.terminate_group();
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }
}

/// Shell line that runs the training command with its combined output piped
/// into the training log. `tee` truncates the log on each (re)start, so a
/// scan never sees sentinels from a previous run, and it joins the same
/// process group so group termination reaches it too.
fn training_shell_command(command: &TrainingCommand, train_log: &std::path::Path) -> String {
    format!(
        "{} 2>&1 | tee '{}'",
        command.to_command_line(),
        train_log.display()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_command_pipes_into_the_log() {
        let command = TrainingCommand::parse("train.py --fp16").unwrap();
        let shell = training_shell_command(&command, std::path::Path::new("logs/run.log"));
        assert_eq!(shell, "train.py --fp16 2>&1 | tee 'logs/run.log'");
    }
}
