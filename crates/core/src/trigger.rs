//! Recovery-trigger latch.
//!
//! A single-writer durable boolean: the monitor arms it by (re)writing a
//! marker file at a well-known path, and the external checkpoint agent
//! consumes and clears it. Every qualifying sampling cycle rewrites the
//! marker, so a consumer polling at wide intervals can never miss the
//! signal. The marker carries no cause payload -- presence is the signal.

use std::io;
use std::path::Path;

/// Default marker location, shared with the checkpoint agent.
pub const DEFAULT_TRIGGER_PATH: &str = "vigil_logs/trigger_checkpoint.flag";

/// Marker content. Fixed and non-empty; rewrites are idempotent.
pub const TRIGGER_MARKER: &str = "trigger_checkpoint";

/// Arm the latch, overwriting any existing marker. Creates the parent
/// directory on first use.
pub fn arm(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, TRIGGER_MARKER)
}

/// Whether the latch is currently armed.
pub fn is_armed(path: &Path) -> bool {
    path.exists()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
