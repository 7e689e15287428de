//! Executor abstraction for running a program.
//!
//! The [`Executor`] trait decouples the controller loop from process
//! spawning. Tests use scripted executors that return predetermined results
//! without touching the filesystem.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{ExecutionResult, LAUNCH_FAILED, Program};
use crate::io::config::ExecutorConfig;
use crate::io::process::{spawn_with_file_sinks, wait_child};

/// Abstraction over program execution backends.
pub trait Executor {
    /// Run `program` to completion. Infrastructure failures are reported as
    /// a result with [`LAUNCH_FAILED`], never as an error.
    fn run(&self, program: &Program) -> ExecutionResult;
}

/// Executor that writes the program to a file in the working directory and
/// runs it with an interpreter.
///
/// Uses fixed file names, so only one invocation may be active at a time.
#[derive(Debug, Clone)]
pub struct InterpreterExecutor {
    interpreter: String,
    workdir: PathBuf,
    program_file: String,
    program_path: PathBuf,
    stdout_path: PathBuf,
    stderr_path: PathBuf,
    timeout: Option<Duration>,
}

impl InterpreterExecutor {
    pub fn new(config: &ExecutorConfig, timeout: Option<Duration>) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            workdir: config.workdir.clone(),
            program_file: config.program_file.clone(),
            program_path: config.program_path(),
            stdout_path: config.stdout_path(),
            stderr_path: config.stderr_path(),
            timeout,
        }
    }

    fn launch(&self, program: &Program) -> Result<ExecutionResult> {
        fs::write(&self.program_path, program.as_str())
            .with_context(|| format!("write program {}", self.program_path.display()))?;

        let mut cmd = Command::new(&self.interpreter);
        // Relative to the child's cwd, which is the workdir.
        cmd.arg(&self.program_file).current_dir(&self.workdir);

        let mut child = spawn_with_file_sinks(cmd, &self.stdout_path, &self.stderr_path)
            .with_context(|| format!("launch {}", self.interpreter))?;
        let outcome = wait_child(&mut child, self.timeout)?;

        let exit_status = if outcome.timed_out {
            LAUNCH_FAILED
        } else {
            outcome.code().unwrap_or(LAUNCH_FAILED)
        };
        Ok(ExecutionResult {
            exit_status,
            stdout: read_capture(&self.stdout_path),
            stderr: read_capture(&self.stderr_path),
            timed_out: outcome.timed_out,
        })
    }

    fn cleanup(&self) {
        for path in [&self.program_path, &self.stdout_path, &self.stderr_path] {
            remove_best_effort(path);
        }
    }
}

impl Executor for InterpreterExecutor {
    #[instrument(skip_all, fields(interpreter = %self.interpreter, timeout_secs = self.timeout.map(|t| t.as_secs())))]
    fn run(&self, program: &Program) -> ExecutionResult {
        info!("executing payload");
        info!(code = %program, "code content");

        let result = match self.launch(program) {
            Ok(result) => result,
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(err = %reason, "executor could not run program");
                ExecutionResult::launch_failed()
            }
        };
        self.cleanup();

        info!(
            exit_code = result.exit_status,
            timed_out = result.timed_out,
            "execution finished"
        );
        info!(stdout = %result.stdout_lossy(), "captured stdout");
        info!(stderr = %result.stderr_lossy(), "captured stderr");
        result
    }
}

/// A capture file that cannot be read counts as empty output.
fn read_capture(path: &Path) -> Vec<u8> {
    match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "failed to read capture file");
            Vec::new()
        }
    }
}

fn remove_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), err = %err, "failed to remove file"),
    }
}
