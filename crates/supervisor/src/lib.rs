//! `vigil-supervisor` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod process;
pub mod recovery;
pub mod sentinel;
pub mod state;
pub mod supervisor;
