//! Cooperative cancellation
//!
//! A crawl never interrupts a running enumeration call. Workers look at the
//! token before acquiring new work and whenever they are woken while parked,
//! so cancellation takes effect between work units, not within one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag (clone freely; all clones observe the same state)
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Underlying flag, for signal handlers that want a plain `AtomicBool`
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_visible_to_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(token.flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_store_through_flag_cancels() {
        // How a signal handler holding only the raw flag cancels a crawl
        let token = CancellationToken::new();
        let flag = token.flag();
        flag.store(true, Ordering::SeqCst);
        assert!(token.is_cancelled());
    }
}
