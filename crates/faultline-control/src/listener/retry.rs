//! Bounded-retry accounting for the pipe listener.

/// Consecutive transport errors tolerated before the pipe listener
/// disables itself.
pub(crate) const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Counts consecutive transport errors against a fixed budget.
///
/// Peer closes and successfully served commands reset the count; only an
/// unbroken run of real transport errors exhausts it.
#[derive(Debug)]
pub(crate) struct RetryPolicy {
    limit: u32,
    consecutive: u32,
}

impl RetryPolicy {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            limit,
            consecutive: 0,
        }
    }

    /// Records one transport error. Returns true when the budget is
    /// exhausted and the listener should stop reopening.
    pub(crate) fn record_error(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive > self.limit
    }

    /// Clears the run of errors after a disconnect or a served command.
    pub(crate) fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub(crate) fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
