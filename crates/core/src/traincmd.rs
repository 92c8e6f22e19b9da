//! Structured model of the training command line.
//!
//! The supervisor rewrites the parallelism flags between restarts, so the
//! command is held as `(program, ordered flag list)` with explicit get/set
//! and re-serialization -- every flag the supervisor does not touch
//! round-trips byte-for-byte.

use crate::error::CoreError;
use crate::reshard::ModelShape;

// ---------------------------------------------------------------------------
// Well-known flag names (Megatron-style launchers)
// ---------------------------------------------------------------------------

pub const FLAG_TENSOR_PARALLEL: &str = "--tensor-model-parallel-size";
pub const FLAG_PIPELINE_PARALLEL: &str = "--pipeline-model-parallel-size";
pub const FLAG_HIDDEN_SIZE: &str = "--hidden-size";
pub const FLAG_NUM_LAYERS: &str = "--num-layers";
pub const FLAG_NUM_ATTENTION_HEADS: &str = "--num-attention-heads";

// ---------------------------------------------------------------------------
// TrainingCommand
// ---------------------------------------------------------------------------

/// A training command line: program plus ordered `--flag [value]` pairs.
///
/// A flag with no following non-flag token is boolean/valueless. Stray
/// positional tokens after the program are dropped at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingCommand {
    program: String,
    flags: Vec<(String, Option<String>)>,
}

impl TrainingCommand {
    /// Parse `<program> --flag [value] --flag [value] ...`.
    pub fn parse(command: &str) -> Result<Self, CoreError> {
        let mut tokens = command.split_whitespace();
        let program = tokens.next().ok_or(CoreError::EmptyCommand)?.to_string();
        let rest: Vec<&str> = tokens.collect();

        let mut flags = Vec::new();
        let mut i = 0;
        while i < rest.len() {
            if rest[i].starts_with("--") {
                let key = rest[i].to_string();
                if i + 1 < rest.len() && !rest[i + 1].starts_with("--") {
                    flags.push((key, Some(rest[i + 1].to_string())));
                    i += 2;
                } else {
                    flags.push((key, None));
                    i += 1;
                }
            } else {
                i += 1;
            }
        }

        Ok(Self { program, flags })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The flag's value, if the flag is present and carries one.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.flags
            .iter()
            .find(|(key, _)| key == flag)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|(key, _)| key == flag)
    }

    /// Parse the flag's value as `u32`. `Ok(None)` when the flag is absent;
    /// an unparseable value is a configuration error.
    pub fn u32_value_of(&self, flag: &'static str) -> Result<Option<u32>, CoreError> {
        match self.value_of(flag) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<u32>()
                .map(Some)
                .map_err(|_| CoreError::InvalidFlagValue {
                    flag,
                    value: raw.to_string(),
                }),
        }
    }

    /// Set a flag's value in place, preserving its position; a new flag is
    /// appended at the end.
    pub fn set(&mut self, flag: &str, value: &str) {
        match self.flags.iter_mut().find(|(key, _)| key == flag) {
            Some((_, slot)) => *slot = Some(value.to_string()),
            None => self.flags.push((flag.to_string(), Some(value.to_string()))),
        }
    }

    /// Re-serialize to a command line.
    pub fn to_command_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        for (key, value) in &self.flags {
            parts.push(key.clone());
            if let Some(value) = value {
                parts.push(value.clone());
            }
        }
        parts.join(" ")
    }

    /// The requested tensor/pipeline degrees; either flag defaults to 1
    /// when absent, matching the launcher's own defaults.
    pub fn parallel_degrees(&self) -> Result<(u32, u32), CoreError> {
        let tensor = self.u32_value_of(FLAG_TENSOR_PARALLEL)?.unwrap_or(1);
        let pipeline = self.u32_value_of(FLAG_PIPELINE_PARALLEL)?.unwrap_or(1);
        Ok((tensor, pipeline))
    }

    /// Model shape for the planner. Every shape flag is required -- planning
    /// a layout without them would silently misplace the job.
    pub fn model_shape(&self) -> Result<ModelShape, CoreError> {
        Ok(ModelShape {
            hidden_size: self.require_u32(FLAG_HIDDEN_SIZE)?,
            num_layers: self.require_u32(FLAG_NUM_LAYERS)?,
            num_attention_heads: self.require_u32(FLAG_NUM_ATTENTION_HEADS)?,
        })
    }

    fn require_u32(&self, flag: &'static str) -> Result<u32, CoreError> {
        self.u32_value_of(flag)?
            .ok_or(CoreError::MissingFlag { flag })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
