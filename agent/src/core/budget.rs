//! Attempt budget for the execute/repair cycle.

/// Default number of repairs allowed after the first execution.
pub const MAX_RETRIES: u32 = 4;

/// Counts executions in `[0, max_retries]`; at most `max_retries + 1` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptBudget {
    attempt: u32,
    max_retries: u32,
}

impl AttemptBudget {
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempt: 0,
            max_retries,
        }
    }

    /// Zero-based index of the current attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Total executions this budget allows.
    pub fn max_executions(&self) -> u32 {
        self.max_retries + 1
    }

    /// The current attempt is the final one; a failure ends the loop.
    pub fn is_last(&self) -> bool {
        self.attempt >= self.max_retries
    }

    /// Move to the next attempt. Returns `false` once the budget is spent.
    pub fn advance(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.attempt += 1;
        true
    }
}

impl Default for AttemptBudget {
    fn default() -> Self {
        Self::new(MAX_RETRIES)
    }
}
