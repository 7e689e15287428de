//! Remote-directed execution agent.
//!
//! The agent fetches a program from a controller, runs it in a child process,
//! and asks the controller for corrected versions until the program succeeds,
//! the retry budget runs out, or the controller orders it to erase itself.
//!
//! - **[`core`]**: Pure, deterministic logic (protocol bodies, diagnostic
//!   report, attempt budget). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (HTTP, child processes, config,
//!   self-removal). Isolated behind traits to enable scripting in tests.
//!
//! [`control`] drives core logic through I/O to implement the agent's run.

pub mod control;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
