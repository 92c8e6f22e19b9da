//! `vigil-core` -- shared domain logic for the vigil training watchdog.
//!
//! Everything here is pure or filesystem-local so it can be unit tested
//! without GPUs or a running training job. The two daemons
//! (`vigil-monitor`, `vigil-supervisor`) build on these modules.

pub mod error;
pub mod history;
pub mod nvidia_smi;
pub mod reshard;
pub mod risk;
pub mod telemetry;
pub mod traincmd;
pub mod trigger;
