//! Shared types passed between the controller loop, the executor and the
//! transport.

use std::fmt;

/// Exit status reported when the child could not be launched, was killed by a
/// signal, or was killed after exceeding its execution timeout.
///
/// Real exit codes are in `0..=255`, so `-1` never collides with one.
pub const LAUNCH_FAILED: i32 = -1;

/// The source text currently subject to execution and repair.
///
/// The agent never interprets the contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program(String);

impl Program {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of one executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Process exit code, or [`LAUNCH_FAILED`].
    pub exit_status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// The child was killed after exceeding the configured execution timeout.
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Result for a child that exited on its own.
    pub fn exited(exit_status: i32, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            exit_status,
            stdout,
            stderr,
            timed_out: false,
        }
    }

    /// Result for a program that never ran: spawn failure, missing
    /// interpreter, or an unwritable program file.
    ///
    /// Both streams stay empty; nothing was captured from a child.
    pub fn launch_failed() -> Self {
        Self {
            exit_status: LAUNCH_FAILED,
            stdout: Vec::new(),
            stderr: Vec::new(),
            timed_out: false,
        }
    }

    /// Exit status 0 is the only success signal.
    pub fn succeeded(&self) -> bool {
        self.exit_status == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Counters describing what a run of the controller loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub executions: u32,
    pub fix_requests: u32,
}

/// Terminal state of the controller loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentOutcome {
    /// A program exited with status 0.
    Succeeded(RunStats),
    /// The server answered a fix request with `status: "ok"`.
    Resolved(RunStats),
    /// Every allowed execution failed.
    GaveUp(RunStats),
    /// The fix request itself failed (no response).
    RepairFailed(RunStats),
    /// The fix response carried neither `status: "ok"` nor a replacement.
    NoFix(RunStats),
    /// The liveness check failed.
    Unreachable,
    /// The generation request produced no usable program.
    NoProgram,
    /// The server sent the terminate signal. Only observable when the kill
    /// switch returns, which the real one never does.
    Destroyed,
}

impl AgentOutcome {
    pub fn stats(&self) -> RunStats {
        match self {
            AgentOutcome::Succeeded(stats)
            | AgentOutcome::Resolved(stats)
            | AgentOutcome::GaveUp(stats)
            | AgentOutcome::RepairFailed(stats)
            | AgentOutcome::NoFix(stats) => *stats,
            AgentOutcome::Unreachable | AgentOutcome::NoProgram | AgentOutcome::Destroyed => {
                RunStats::default()
            }
        }
    }

    /// Map the outcome onto the stable process exit codes.
    pub fn exit_code(&self) -> i32 {
        use crate::exit_codes;
        match self {
            AgentOutcome::Succeeded(_) | AgentOutcome::Resolved(_) | AgentOutcome::Destroyed => {
                exit_codes::OK
            }
            AgentOutcome::Unreachable | AgentOutcome::NoProgram => exit_codes::ABORTED,
            AgentOutcome::GaveUp(_) => exit_codes::GAVE_UP,
            AgentOutcome::RepairFailed(_) | AgentOutcome::NoFix(_) => exit_codes::STALLED,
        }
    }
}
