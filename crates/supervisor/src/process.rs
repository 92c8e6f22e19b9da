//! Managed child process groups.
//!
//! Training jobs and the monitor are spawned as leaders of their own
//! process groups so that termination reaches every descendant -- the
//! training command forks workers and pipes its output through `tee`, and
//! killing only the immediate child would orphan them.

use std::io;

use tokio::process::{Child, Command};

/// A child process spawned as the leader of a new process group.
#[derive(Debug)]
pub struct ManagedProcess {
    child: Child,
    pgid: i32,
    label: &'static str,
}

impl ManagedProcess {
    /// Spawn `command` via `sh -c` in a new process group.
    pub fn spawn(label: &'static str, command: &str) -> io::Result<Self> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .process_group(0)
            .spawn()?;

        let pgid = child.id().map(|id| id as i32).ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "child exited before its pid was read")
        })?;

        tracing::info!(label, pgid, "spawned process group");
        Ok(Self { child, pgid, label })
    }

    /// Whether the direct child is still running. Safe to call repeatedly
    /// after exit.
    pub fn is_alive(&mut self) -> io::Result<bool> {
        Ok(self.child.try_wait()?.is_none())
    }

    /// SIGTERM the whole process group. A group that has already vanished
    /// is not an error.
    pub fn terminate_group(&self) {
        // SAFETY: killpg on a recorded pgid; ESRCH for a gone group is
        // the expected benign outcome and is ignored.
        let rc = unsafe { libc::killpg(self.pgid, libc::SIGTERM) };
        if rc == 0 {
            tracing::info!(label = self.label, pgid = self.pgid, "sent SIGTERM to process group");
        } else {
            tracing::debug!(label = self.label, pgid = self.pgid, "process group already gone");
        }
    }

    pub fn pgid(&self) -> i32 {
        self.pgid
    }
}
