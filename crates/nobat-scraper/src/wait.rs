//! Bounded predicate waits driven by DOM change notifications.
//!
//! The listing and profile pages are mutated asynchronously by their own
//! scripts ("load more" expansion, reveal-phone widgets). Rather than
//! polling, callers re-evaluate their predicate whenever the page's
//! change-notification subscription fires, bounded by a deadline:
//!
//! ```ignore
//! let mut wait = ChangeWait::new(browser.dom_changes(tab), timeout);
//! loop {
//!     if predicate_holds().await? {
//!         break;
//!     }
//!     if !wait.tick().await {
//!         break; // timed out — absence is the caller's call, not an error
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// A deadline tied to a change-notification subscription.
pub struct ChangeWait {
    changes: watch::Receiver<u64>,
    deadline: Instant,
}

impl ChangeWait {
    #[must_use]
    pub fn new(changes: watch::Receiver<u64>, timeout: Duration) -> Self {
        Self {
            changes,
            deadline: Instant::now() + timeout,
        }
    }

    /// Waits for the next change notification. Returns `false` when the
    /// deadline passes first or the subscription is closed (no further
    /// changes will ever arrive) — timing out is a result, not an error.
    pub async fn tick(&mut self) -> bool {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        matches!(
            tokio::time::timeout(remaining, self.changes.changed()).await,
            Ok(Ok(()))
        )
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}
