//! Cooperative cancellation.
//!
//! The kernels poll a shared flag at a configurable cadence (and at every
//! back-tracking state transition) instead of installing any process-level
//! interrupt machinery. The caller keeps a clone of the token and sets it
//! from wherever makes sense — a signal handler, a UI thread, a timeout task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clonable cancellation handle shared between a caller and a running kernel.
///
/// All clones observe the same flag. Cancellation is sticky: once set it
/// cannot be cleared, so a token is good for exactly one run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_and_sticky() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());

        clone.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }
}
