//! Cooperative cancellation for long-running iterative work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag.
///
/// The UI hands a clone into a long-running operation (feature synthesis,
/// Integrated Gradients) and triggers it when the user navigates away or
/// replaces the input. Operations check the flag between iterations; tensors
/// from completed iterations are reclaimed by scope regardless of where
/// cancellation lands.
///
/// # Example
///
/// ```rust
/// use convlens_core::CancelToken;
///
/// let token = CancelToken::new();
/// let worker = token.clone();
///
/// assert!(!worker.is_cancelled());
/// token.cancel();
/// assert!(worker.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear the flag so the token can gate a new request.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();

        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());

        token.reset();
        assert!(!clone.is_cancelled());
    }
}
