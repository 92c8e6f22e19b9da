//! Parallelism layout planning for a changed device count.
//!
//! When a job loses (or regains) GPUs, the previously requested
//! tensor × pipeline split may no longer be feasible. The planner searches
//! the constrained candidate space for the layout closest to the request,
//! with a deterministic tie-break so repeated recoveries land on the same
//! answer.

use crate::error::CoreError;

/// Model dimensions that constrain how it can be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelShape {
    pub hidden_size: u32,
    pub num_layers: u32,
    pub num_attention_heads: u32,
}

/// A feasible parallelism layout.
///
/// Invariant: `tensor * pipeline * data` equals the device count the layout
/// was planned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelismConfig {
    pub tensor: u32,
    pub pipeline: u32,
    pub data: u32,
}

impl ParallelismConfig {
    /// Devices needed for one model replica.
    pub fn world_size(&self) -> u32 {
        self.tensor * self.pipeline
    }

    /// Total devices the layout occupies.
    pub fn device_count(&self) -> u32 {
        self.tensor * self.pipeline * self.data
    }
}

/// All positive divisors of `n`, ascending.
///
/// Trial division up to the integer square root, collecting both cofactors.
pub fn divisors(n: u32) -> Vec<u32> {
    let mut divs = Vec::new();
    let mut i: u64 = 1;
    while i * i <= u64::from(n) {
        if u64::from(n) % i == 0 {
            divs.push(i as u32);
            let cofactor = u64::from(n) / i;
            if cofactor != i {
                divs.push(cofactor as u32);
            }
        }
        i += 1;
    }
    divs.sort_unstable();
    divs
}

/// Find the feasible layout closest to the desired tensor/pipeline degrees.
///
/// Candidate tensor degrees must divide both the hidden size and the
/// attention head count; candidate pipeline degrees must divide the layer
/// count; a candidate's world size must divide the device count. Closeness
/// is the L1 distance on (tensor, pipeline). Ties go to the candidate seen
/// first in ascending-tensor, then ascending-pipeline, order.
///
/// With no feasible candidate at all, falls back to pure data parallelism
/// `(1, 1, device_count)`. A device count of zero is a fatal error -- there
/// is nothing to recover onto, and silently returning a layout would
/// restart the job into the same failure.
pub fn plan_parallelism(
    desired_tensor: u32,
    desired_pipeline: u32,
    shape: ModelShape,
    device_count: u32,
) -> Result<ParallelismConfig, CoreError> {
    if device_count == 0 {
        return Err(CoreError::NoDevices);
    }

    let mut best: Option<(u32, ParallelismConfig)> = None;

    for tensor in divisors(shape.hidden_size) {
        if shape.num_attention_heads % tensor != 0 {
            continue;
        }
        for pipeline in divisors(shape.num_layers) {
            let world = u64::from(tensor) * u64::from(pipeline);
            if world > u64::from(device_count) || u64::from(device_count) % world != 0 {
                continue;
            }
            let candidate = ParallelismConfig {
                tensor,
                pipeline,
                data: device_count / (world as u32),
            };
            let score =
                tensor.abs_diff(desired_tensor) + pipeline.abs_diff(desired_pipeline);
            match &best {
                // Strictly-smaller only: on equal scores the earlier
                // candidate (smaller tensor, then smaller pipeline) stands.
                Some((best_score, _)) if *best_score <= score => {}
                _ => best = Some((score, candidate)),
            }
        }
    }

    Ok(best.map(|(_, config)| config).unwrap_or(ParallelismConfig {
        tensor: 1,
        pipeline: 1,
        data: device_count,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
