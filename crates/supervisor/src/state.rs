//! Training lifecycle states.
//!
//! The supervisor acts on these, never on the child's raw exit code: an
//! exit code cannot distinguish "the launcher rejected a flag" from "a GPU
//! fell off the bus an hour in", but the log sentinels can.

use crate::sentinel::LogProgress;

/// Lifecycle state of the supervised training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    NotStarted,
    Running,
    /// Died without ever reaching the training loop -- a misconfiguration,
    /// not a hardware event.
    ExitedBeforeTrainingStarted,
    /// Died mid-training -- treated as a hardware failure needing recovery.
    ExitedAfterTrainingStarted,
    CompletedSuccessfully,
}

impl TrainingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingState::NotStarted => "not_started",
            TrainingState::Running => "running",
            TrainingState::ExitedBeforeTrainingStarted => "exited_before_training_started",
            TrainingState::ExitedAfterTrainingStarted => "exited_after_training_started",
            TrainingState::CompletedSuccessfully => "completed_successfully",
        }
    }
}

impl std::fmt::Display for TrainingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a dead training process from its log progress.
pub fn classify_exit(progress: LogProgress) -> TrainingState {
    match progress {
        LogProgress::Finished => TrainingState::CompletedSuccessfully,
        LogProgress::Started => TrainingState::ExitedAfterTrainingStarted,
        LogProgress::None => TrainingState::ExitedBeforeTrainingStarted,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
