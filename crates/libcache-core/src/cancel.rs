//! Abort flag for load waves.
//!
//! Every task of a wave holds a clone of the manager's token and checks it
//! once, right before it starts its unit of work. A backend call that is
//! already running is never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared cancellation flag.
///
/// Clones share state: cancelling any clone is observed by all of them.
///
/// # Example
///
/// ```
/// use libcache::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_view = token.clone();
///
/// token.cancel();
/// assert!(worker_view.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every task that has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag before a new wave is submitted.
    ///
    /// Tasks of the previous wave that are still queued will run again, so
    /// only reset once that wave has drained.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_clone_shares_state() {
        let token = CancellationToken::new();
        let task_view = token.clone();

        token.cancel();
        assert!(task_view.is_cancelled());

        task_view.reset();
        assert!(!token.is_cancelled());
    }
}
