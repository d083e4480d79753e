//! Observable cancellation token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-way cancellation token handed out by a [`JobRunner`](crate::runner::JobRunner).
///
/// The token transitions not-cancelled -> cancelled exactly once and never
/// resets. Clones share the same underlying state, so a signal obtained early
/// in a job observes a cancel requested at any later point.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<AtomicBool>,
}

impl CancelSignal {
    /// Create a fresh, not-yet-cancelled signal.
    pub fn new() -> Self {
        CancelSignal {
            inner: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Non-blocking read of the cancellation state. Safe to poll from hot loops.
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Move the signal into the cancelled state.
    ///
    /// Idempotent: triggering an already-cancelled signal is a no-op, not an
    /// error.
    pub(crate) fn trigger(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }
}

/// Equality is identity of the shared state, not of the observed value.
/// Two independently created signals are never equal even while both report
/// not-cancelled.
impl PartialEq for CancelSignal {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for CancelSignal {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_starts_not_cancelled() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_trigger_is_one_way_and_idempotent() {
        let signal = CancelSignal::new();
        signal.trigger();
        assert!(signal.is_cancelled());

        signal.trigger();
        signal.trigger();
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = CancelSignal::new();
        let observer = signal.clone();

        signal.trigger();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_equality_is_identity() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        let other = CancelSignal::new();

        assert_eq!(signal, clone);
        assert_ne!(signal, other);
    }
}
