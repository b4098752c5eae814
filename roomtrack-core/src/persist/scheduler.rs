use crate::constants::SAVE_DEBOUNCE_MS;

/// Coalesces bursts of mutations into one write.
///
/// The scheduler owns no timer. Callers pass the current time in
/// milliseconds; a host timer (or a test) calls back once the deadline from
/// [`SaveScheduler::request`] has passed. Each new request pushes the deadline
/// out, so only the last state of a burst is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveScheduler {
    debounce_ms: u64,
    deadline: Option<u64>,
    failed: bool,
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(SAVE_DEBOUNCE_MS)
    }
}

impl SaveScheduler {
    #[must_use]
    pub const fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            deadline: None,
            failed: false,
        }
    }

    #[must_use]
    pub const fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    /// Arm (or re-arm) the pending write. Returns the new deadline.
    pub fn request(&mut self, now_ms: u64) -> u64 {
        let deadline = now_ms.saturating_add(self.debounce_ms);
        self.deadline = Some(deadline);
        deadline
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    #[must_use]
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.deadline.is_some_and(|deadline| now_ms >= deadline)
    }

    /// Disarm the pending write if it is due, reporting whether it was.
    pub fn take_due(&mut self, now_ms: u64) -> bool {
        if self.is_due(now_ms) {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    /// Drop any pending write. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Forget both the pending write and any failure, e.g. after the state
    /// was replaced from storage.
    pub fn reset(&mut self) {
        self.deadline = None;
        self.failed = false;
    }

    pub fn record_result(&mut self, succeeded: bool) {
        self.failed = !succeeded;
    }

    /// Last write failed and nothing has succeeded since.
    #[must_use]
    pub const fn has_failed(&self) -> bool {
        self.failed
    }

    /// No write pending and the last one (if any) succeeded.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.deadline.is_none() && !self.failed
    }
}
