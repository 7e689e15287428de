//! Diagnostic report sent to `/fix` after a failed execution.

use crate::core::types::ExecutionResult;

/// Render `"Exit Code: <n>\nStderr: <stderr>\nStdout: <stdout>"`.
///
/// Captured bytes are decoded lossily; missing streams render as empty strings.
pub fn diagnostic_report(result: &ExecutionResult) -> String {
    format!(
        "Exit Code: {}\nStderr: {}\nStdout: {}",
        result.exit_status,
        result.stderr_lossy(),
        result.stdout_lossy()
    )
}
