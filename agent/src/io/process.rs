//! Helpers for running a child process with its output redirected to files.
//!
//! Output goes to files rather than pipes so a chatty child never blocks on a
//! full pipe and whatever it wrote before dying is still on disk.

use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How a waited-on child ended.
#[derive(Debug)]
pub struct WaitOutcome {
    pub status: ExitStatus,
    /// The child was killed after exceeding the wait timeout.
    pub timed_out: bool,
}

impl WaitOutcome {
    /// Exit code, or `None` when the child was terminated by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Spawn `cmd` with stdin closed and stdout/stderr truncated into the given
/// files.
#[instrument(skip_all, fields(stdout = %stdout_path.display(), stderr = %stderr_path.display()))]
pub fn spawn_with_file_sinks(
    mut cmd: Command,
    stdout_path: &Path,
    stderr_path: &Path,
) -> Result<Child> {
    let stdout = File::create(stdout_path)
        .with_context(|| format!("create capture file {}", stdout_path.display()))?;
    let stderr = File::create(stderr_path)
        .with_context(|| format!("create capture file {}", stderr_path.display()))?;

    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    debug!("spawning child process");
    match cmd.spawn() {
        Ok(child) => Ok(child),
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            Err(e).context("spawn command")
        }
    }
}

/// Block until the child exits.
///
/// With `timeout`, a child still running at the deadline is killed and
/// reaped, and the outcome is marked `timed_out`. If waiting itself fails the
/// child is still killed and reaped before the error is returned.
#[instrument(skip_all, fields(pid = child.id(), timeout_secs = timeout.map(|t| t.as_secs())))]
pub fn wait_child(child: &mut Child, timeout: Option<Duration>) -> Result<WaitOutcome> {
    match wait_or_kill(child, timeout) {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            error!(err = %err, "waiting on child failed, killing");
            reap_best_effort(child);
            Err(err)
        }
    }
}

fn wait_or_kill(child: &mut Child, timeout: Option<Duration>) -> Result<WaitOutcome> {
    let Some(timeout) = timeout else {
        let status = child.wait().context("wait for child")?;
        debug!(exit_code = ?status.code(), "child finished");
        return Ok(WaitOutcome {
            status,
            timed_out: false,
        });
    };

    match child.wait_timeout(timeout).context("wait for child")? {
        Some(status) => {
            debug!(exit_code = ?status.code(), "child finished");
            Ok(WaitOutcome {
                status,
                timed_out: false,
            })
        }
        None => {
            warn!(timeout_secs = timeout.as_secs(), "child timed out, killing");
            child.kill().context("kill child")?;
            let status = child.wait().context("wait child after kill")?;
            Ok(WaitOutcome {
                status,
                timed_out: true,
            })
        }
    }
}

/// Kill and reap `child`, logging instead of failing.
fn reap_best_effort(child: &mut Child) {
    if let Err(err) = child.kill() {
        warn!(err = %err, "failed to kill child");
    }
    if let Err(err) = child.wait() {
        warn!(err = %err, "failed to reap child");
    }
}
