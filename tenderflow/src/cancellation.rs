//! Cooperative shutdown signalling.
//!
//! The pipeline checks the token between tenders, never mid-extraction, so
//! cancellation is deliberately coarse: the current tender finishes, the
//! rest are abandoned, and the run is still finalized.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// A token for cooperative run cancellation.
///
/// Cancellation is idempotent; only the first reason is kept.
#[derive(Default)]
pub struct ShutdownToken {
    requested: AtomicBool,
    reason: RwLock<Option<String>>,
}

impl ShutdownToken {
    /// Creates a new, untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown with a reason. The first reason wins.
    pub fn trigger(&self, reason: impl Into<String>) {
        if self
            .requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.reason.write() = Some(reason.into());
        }
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// The recorded shutdown reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }
}

impl std::fmt::Debug for ShutdownToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownToken")
            .field("triggered", &self.is_triggered())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_untriggered() {
        let token = ShutdownToken::new();
        assert!(!token.is_triggered());
        assert!(token.reason().is_none());
    }

    #[test]
    fn trigger_records_reason() {
        let token = ShutdownToken::new();
        token.trigger("user interrupt");
        assert!(token.is_triggered());
        assert_eq!(token.reason(), Some("user interrupt".to_string()));
    }

    #[test]
    fn first_reason_wins() {
        let token = ShutdownToken::new();
        token.trigger("first");
        token.trigger("second");
        assert_eq!(token.reason(), Some("first".to_string()));
    }
}
