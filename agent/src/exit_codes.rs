//! Stable exit codes for the agent binary.

/// A program succeeded, the server declared the failure resolved, or the
/// agent erased itself on request.
pub const OK: i32 = 0;
/// Liveness check or initial generation failed, or the configuration is invalid.
pub const ABORTED: i32 = 1;
/// Every allowed execution failed.
pub const GAVE_UP: i32 = 2;
/// A fix request failed or returned nothing usable.
pub const STALLED: i32 = 3;
