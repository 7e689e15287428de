//! I/O helpers for the agent: HTTP transport, child processes, configuration
//! and self-removal.

pub mod config;
pub mod executor;
pub mod process;
pub mod self_destruct;
pub mod transport;
