//! Fatal configuration and recovery errors.
//!
//! Transient telemetry failures have their own error type
//! ([`crate::nvidia_smi::SmiError`]) and never escalate; everything here
//! aborts the operation that produced it.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("no GPUs detected; cannot plan a parallelism layout")]
    NoDevices,

    #[error("training command is missing required flag {flag}")]
    MissingFlag { flag: &'static str },

    #[error("flag {flag} has a non-integer value {value:?}")]
    InvalidFlagValue { flag: &'static str, value: String },

    #[error("training command is empty")]
    EmptyCommand,

    #[error("recovery command printed {0:?}; expected exactly two integers \"<tensor> <pipeline>\"")]
    MalformedRecoveryOutput(String),
}
