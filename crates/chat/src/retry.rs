//! Bounded retry for turns whose remote session went away.

/// Lifecycle of one turn with respect to stale-session faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// First attempt in progress.
    Active,
    /// A stale session was seen; the caller must invalidate and retry.
    Faulted,
    /// The single retry is in progress.
    Retried,
    /// Gave up; the fault is final.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    Retry,
    Abandon,
}

#[derive(Debug)]
pub struct RetryController {
    phase: RetryPhase,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryController {
    pub fn new() -> Self {
        Self {
            phase: RetryPhase::Active,
        }
    }

    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    /// Record a fault. Only a stale-session fault on the first attempt earns a
    /// retry.
    pub fn on_fault(&mut self, stale_session: bool) -> FaultAction {
        if stale_session && self.phase == RetryPhase::Active {
            self.phase = RetryPhase::Faulted;
            FaultAction::Retry
        } else {
            self.phase = RetryPhase::Abandoned;
            FaultAction::Abandon
        }
    }

    /// Enter the retry attempt after a [`FaultAction::Retry`].
    pub fn begin_retry(&mut self) {
        if self.phase == RetryPhase::Faulted {
            self.phase = RetryPhase::Retried;
        }
    }

    /// Attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        match self.phase {
            RetryPhase::Active => 1,
            _ => 2,
        }
    }
}
