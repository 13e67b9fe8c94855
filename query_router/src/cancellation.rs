//! Cooperative cancellation, checked at pipeline boundaries.
//!
//! Grounded in the shape of the teacher's `tracker` crate (cheap, `Clone`-and-share handles
//! coordinating work across threads) but trimmed to the single primitive the engine needs: a
//! flag that can be observed and tripped from any thread.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A handle that can be cloned and shared with callers of [`crate::engine::Engine`].
///
/// Cancelling never unwinds through a panic or exception; pipeline stages poll
/// [`CancellationToken::is_cancelled`] at each boundary and return
/// [`crate::engine::Error::Cancelled`] when it trips.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_observed_by_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
