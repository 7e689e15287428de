//! Deterministic, pure logic shared by the agent.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values (programs, execution results, protocol bodies) and return
//! deterministic outputs suitable for tests.

pub mod budget;
pub mod protocol;
pub mod report;
pub mod types;
