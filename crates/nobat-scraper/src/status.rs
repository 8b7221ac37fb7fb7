//! Status publication: durable persistence plus live broadcast.
//!
//! Every meaningful controller transition produces a new
//! [`StatusSnapshot`] that is broadcast on a `watch` channel and written
//! wholesale to the backend's key-value store. No listener is fine;
//! persistence failures are logged and never fail the run.

use nobat_core::{ErrorEntry, StatusSnapshot};
use tokio::sync::watch;

use crate::browser::Browser;

/// Persisted key holding the serialized [`StatusSnapshot`].
pub const STATUS_KEY: &str = "status";

/// Persisted key holding the serialized `ScrapeConfig`.
pub const CONFIG_KEY: &str = "config";

pub struct StatusPublisher {
    tx: watch::Sender<StatusSnapshot>,
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPublisher {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self { tx }
    }

    /// Live subscription; every published snapshot is observable here.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    /// Mutates the current snapshot in place (atomically with respect to
    /// other publishers) and broadcasts the result. Returns the published
    /// snapshot so callers can persist it.
    pub fn update(&self, mutate: impl FnOnce(&mut StatusSnapshot)) -> StatusSnapshot {
        self.tx.send_modify(mutate);
        self.tx.borrow().clone()
    }

    /// [`update`](Self::update) followed by a wholesale write of the
    /// snapshot to the backend's store under [`STATUS_KEY`].
    pub async fn publish<B: Browser>(
        &self,
        browser: &B,
        mutate: impl FnOnce(&mut StatusSnapshot),
    ) -> StatusSnapshot {
        let snapshot = self.update(mutate);
        match serde_json::to_value(&snapshot) {
            Ok(value) => {
                if let Err(err) = browser.state_set(STATUS_KEY, value).await {
                    tracing::warn!(error = %err, "failed to persist status snapshot");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize status snapshot");
            }
        }
        snapshot
    }
}

/// Records an error for `key` (a profile URL or a sentinel), replacing any
/// existing entry with the same key.
pub fn record_error(snapshot: &mut StatusSnapshot, key: &str, message: &str) {
    snapshot.errors.retain(|e| e.url != key);
    snapshot.errors.push(ErrorEntry {
        url: key.to_owned(),
        message: message.to_owned(),
    });
}

/// Clears the error for `key`, if any. A later success for a key removes
/// its stale failure.
pub fn clear_error(snapshot: &mut StatusSnapshot, key: &str) {
    snapshot.errors.retain(|e| e.url != key);
}
