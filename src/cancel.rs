//! Cooperative cancellation for long-running analysis.
//!
//! The pipeline checks the token between phases and between per-file work
//! items inside parallel phases. Cancellation is a request, not a kill:
//! the current work item finishes, then the run unwinds with
//! [`AxonError::Cancelled`] and nothing is persisted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::AxonError;

/// Cloneable cancellation handle shared between the caller and the pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once `cancel` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(AxonError::Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<(), AxonError> {
        if self.is_cancelled() {
            Err(AxonError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(AxonError::Cancelled)));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }
}
