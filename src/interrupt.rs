//! Cooperative cancellation for long-running generation and simulation.
//!
//! Checked between generation passes and between simulation steps. Hitting
//! either signal stops the run and returns the partial result flagged as
//! truncated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every run holding this flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why a run was interrupted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptReason {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation flag plus optional wall-clock deadline.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    cancel: Option<CancelFlag>,
    deadline: Option<Instant>,
}

impl Interrupt {
    /// An interrupt that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Poll both signals. Cancellation wins over the deadline.
    pub fn check(&self) -> Option<InterruptReason> {
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Some(InterruptReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(InterruptReason::DeadlineExceeded),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_never_fires() {
        assert_eq!(Interrupt::none().check(), None);
    }

    #[test]
    fn test_cancel_is_shared() {
        let flag = CancelFlag::new();
        let interrupt = Interrupt::none().with_cancel(flag.clone());
        assert_eq!(interrupt.check(), None);
        flag.cancel();
        assert_eq!(interrupt.check(), Some(InterruptReason::Cancelled));
    }

    #[test]
    fn test_expired_deadline() {
        let interrupt = Interrupt::none().with_timeout(Duration::from_secs(0));
        assert_eq!(interrupt.check(), Some(InterruptReason::DeadlineExceeded));
    }
}
