//! Run orchestration: Idle → Running → (Stopping) → Idle.
//!
//! One controller drives one logical browsing session: discovery on the
//! operator's listing tab, then a sequential visit loop over the queue
//! with bounded per-URL retries, an inter-visit delay, cooperative stop,
//! and a finalizing CSV export. Every entry point degrades to a reported
//! error; nothing here panics on a misbehaving page or backend.

use std::sync::Arc;
use std::time::Duration;

use nobat_core::{
    AppConfig, DoctorRecord, RetryState, RunState, ScrapeConfig, StatusSnapshot,
};
use tokio::sync::watch;

use crate::browser::{Browser, TabInfo};
use crate::discover;
use crate::error::ScrapeError;
use crate::extract;
use crate::queue::ScrapeJob;
use crate::session::SessionManager;
use crate::site;
use crate::status::{self, StatusPublisher, CONFIG_KEY};

/// Minimum wait between failed attempts on one URL, regardless of how
/// small the configured inter-visit delay is.
const RETRY_DELAY_FLOOR_MS: u64 = 1000;

/// Sentinel error keys for failures not tied to one profile URL.
const GLOBAL_KEY: &str = "global";
const DOWNLOAD_KEY: &str = "download";
const FINALISE_KEY: &str = "finalise";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// Discovery finished but found no profile links; the controller is
    /// back to idle.
    NoLinks,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// A run was active; it will finish the in-flight profile, export a
    /// partial CSV, and return to idle.
    Stopping,
    /// Nothing was running.
    Idle,
}

pub struct Controller<B: Browser + 'static> {
    inner: Arc<Inner<B>>,
}

impl<B: Browser + 'static> Clone for Controller<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<B> {
    browser: B,
    app: AppConfig,
    publisher: StatusPublisher,
    stop: watch::Sender<bool>,
}

impl<B: Browser + 'static> Controller<B> {
    #[must_use]
    pub fn new(browser: B, app: AppConfig) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                browser,
                app,
                publisher: StatusPublisher::new(),
                stop,
            }),
        }
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        self.inner.publisher.snapshot()
    }

    /// Live status subscription.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.publisher.subscribe()
    }

    /// Validates, clamps, persists, and publishes a new runtime config.
    /// Takes effect on the next run.
    pub async fn update_config(&self, config: ScrapeConfig) -> ScrapeConfig {
        let config = config.sanitized();
        match serde_json::to_value(&config) {
            Ok(value) => {
                if let Err(err) = self.inner.browser.state_set(CONFIG_KEY, value).await {
                    tracing::warn!(error = %err, "failed to persist config");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize config"),
        }
        self.inner
            .publisher
            .publish(&self.inner.browser, |s| s.config = Some(config.clone()))
            .await;
        config
    }

    /// Starts a run from the operator's current listing tab.
    ///
    /// Refuses when a run is already active, when the active tab is not a
    /// listing page on the target host, or when discovery fails; finding
    /// zero links ends the attempt cleanly with [`StartOutcome::NoLinks`].
    pub async fn start(&self, config: Option<ScrapeConfig>) -> StartOutcome {
        // Claim the state machine first so concurrent starts collapse to
        // one winner.
        let mut claimed = false;
        self.inner.publisher.update(|s| {
            if s.state == RunState::Idle {
                s.state = RunState::Running;
                s.message = "Starting".to_owned();
                claimed = true;
            }
        });
        if !claimed {
            return StartOutcome::AlreadyRunning;
        }

        match self.prepare(config).await {
            Ok(Some((job, cfg, opener))) => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    run(inner, job, cfg, opener).await;
                });
                StartOutcome::Started
            }
            Ok(None) => {
                self.inner
                    .publisher
                    .publish(&self.inner.browser, |s| {
                        s.state = RunState::Idle;
                        s.message = "No profile links found on the listing page".to_owned();
                    })
                    .await;
                StartOutcome::NoLinks
            }
            Err(err) => {
                let message = err.to_string();
                self.inner
                    .publisher
                    .publish(&self.inner.browser, |s| {
                        s.state = RunState::Idle;
                        s.message = message.clone();
                        status::record_error(s, GLOBAL_KEY, &message);
                    })
                    .await;
                StartOutcome::Error(message)
            }
        }
    }

    /// Requests a cooperative stop. The in-flight profile finishes; the
    /// partial results are exported before the controller returns to idle.
    /// The stopping snapshot is persisted like any other transition.
    pub async fn stop(&self) -> StopOutcome {
        let mut active = false;
        self.inner
            .publisher
            .publish(&self.inner.browser, |s| {
                if s.state == RunState::Running {
                    s.state = RunState::Stopping;
                    s.message = "Stopping after the current profile".to_owned();
                    active = true;
                } else if s.state == RunState::Stopping {
                    active = true;
                }
            })
            .await;
        if active {
            self.inner.stop.send_replace(true);
            StopOutcome::Stopping
        } else {
            StopOutcome::Idle
        }
    }

    /// Resolves when the controller reaches idle. Meant for embedders that
    /// start a run and want to block on its completion.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.inner.publisher.subscribe();
        let _ = rx.wait_for(|s| s.state == RunState::Idle).await;
    }

    /// Validates the environment and performs discovery. `Ok(None)` means
    /// a clean zero-link outcome.
    async fn prepare(
        &self,
        config: Option<ScrapeConfig>,
    ) -> Result<Option<(ScrapeJob, ScrapeConfig, TabInfo)>, ScrapeError> {
        let inner = &self.inner;
        inner.stop.send_replace(false);

        let cfg = match config {
            Some(cfg) => cfg.sanitized(),
            None => load_persisted_config(&inner.browser).await,
        };
        self.inner.publisher.update(|s| s.config = Some(cfg.clone()));

        let listing = inner.browser.active_tab().await?;
        if !site::is_listing_url(&listing.url, &inner.app.target_host) {
            return Err(ScrapeError::NotOnListingPage {
                host: inner.app.target_host.clone(),
                found: listing.url,
            });
        }

        inner
            .publisher
            .publish(&inner.browser, |s| {
                s.message = "Expanding the listing and collecting links".to_owned();
            })
            .await;
        let report = discover::discover_links(&inner.browser, listing.id, &inner.app).await?;
        if report.links.is_empty() {
            return Ok(None);
        }

        let job = ScrapeJob::new(report.links);
        inner
            .publisher
            .publish(&inner.browser, |s| {
                s.counts = job.counts();
                s.message = format!("Found {} profile links", s.counts.total);
            })
            .await;
        Ok(Some((job, cfg, listing)))
    }
}

async fn load_persisted_config<B: Browser>(browser: &B) -> ScrapeConfig {
    match browser.state_get(CONFIG_KEY).await {
        Ok(Some(value)) => match serde_json::from_value::<ScrapeConfig>(value) {
            Ok(cfg) => cfg.sanitized(),
            Err(err) => {
                tracing::warn!(error = %err, "persisted config unreadable; using defaults");
                ScrapeConfig::default()
            }
        },
        Ok(None) => ScrapeConfig::default(),
        Err(err) => {
            tracing::warn!(error = %err, "config lookup failed; using defaults");
            ScrapeConfig::default()
        }
    }
}

/// The visit loop plus finalization. Runs as a spawned task; all failure
/// paths end with the controller idle.
async fn run<B: Browser>(inner: Arc<Inner<B>>, mut job: ScrapeJob, cfg: ScrapeConfig, opener: TabInfo) {
    let browser = &inner.browser;
    let mut session = SessionManager::new(
        browser,
        Some(opener),
        Duration::from_secs(inner.app.nav_timeout_secs),
    );
    let stop = inner.stop.subscribe();

    let mut stopped = false;
    loop {
        if *stop.borrow() {
            stopped = true;
            break;
        }
        let Some(url) = job.next_url() else {
            break;
        };

        let record = visit_with_retries(&inner, &mut session, &url, &cfg).await;
        let counts_after = {
            job.push_result(record.clone());
            job.counts()
        };
        inner
            .publisher
            .publish(browser, |s| {
                s.retry = None;
                s.counts = counts_after;
                match &record.error {
                    Some(message) => status::record_error(s, &url, message),
                    None => status::clear_error(s, &url),
                }
                s.message = format!(
                    "Processed {} of {}",
                    counts_after.processed, counts_after.total
                );
                s.last_record = Some(record.clone());
            })
            .await;

        if *stop.borrow() {
            stopped = true;
            break;
        }
        if cfg.delay_ms > 0 && !job.is_exhausted() {
            tokio::time::sleep(Duration::from_millis(cfg.delay_ms)).await;
        }
    }

    finalize(&inner, &mut session, &job, stopped).await;
}

/// One URL through its attempt budget. Always yields a record: the
/// extracted one, or a placeholder carrying the last error.
async fn visit_with_retries<B: Browser>(
    inner: &Inner<B>,
    session: &mut SessionManager<'_, B>,
    url: &str,
    cfg: &ScrapeConfig,
) -> DoctorRecord {
    let total_attempts = cfg.total_attempts();
    let mut last_error = String::new();

    for attempt in 1..=total_attempts {
        if attempt > 1 {
            inner
                .publisher
                .publish(&inner.browser, |s| {
                    s.retry = Some(RetryState {
                        url: url.to_owned(),
                        attempt,
                        total_attempts,
                    });
                    s.message = format!("Retrying ({attempt} of {total_attempts})");
                })
                .await;
            tokio::time::sleep(Duration::from_millis(cfg.delay_ms.max(RETRY_DELAY_FLOOR_MS)))
                .await;
        }

        match extract::collect_profile(session, url, &inner.app, cfg.flat_entry_seeds_office).await
        {
            Ok(record) => return record,
            Err(err) => {
                tracing::warn!(url, attempt, total_attempts, error = %err, "profile attempt failed");
                last_error = err.to_string();
                if !err.is_transient() {
                    break;
                }
            }
        }
    }

    DoctorRecord::failed(url, &last_error)
}

/// Exports what was collected, tears the session down, and forces idle.
async fn finalize<B: Browser>(
    inner: &Inner<B>,
    session: &mut SessionManager<'_, B>,
    job: &ScrapeJob,
    stopped: bool,
) {
    let browser = &inner.browser;

    let export_result = if job.results().is_empty() {
        Ok(None)
    } else {
        crate::export::deliver_export(browser, job.results(), stopped)
            .await
            .map(Some)
    };

    let teardown_result = session.teardown().await;

    inner
        .publisher
        .publish(browser, |s| {
            s.state = RunState::Idle;
            s.retry = None;
            match &teardown_result {
                Ok(()) => status::clear_error(s, FINALISE_KEY),
                Err(err) => status::record_error(s, FINALISE_KEY, &err.to_string()),
            }
            match &export_result {
                Ok(Some(filename)) => {
                    status::clear_error(s, DOWNLOAD_KEY);
                    s.message = if stopped {
                        format!("Stopped; partial export saved as {filename}")
                    } else {
                        format!("Finished; export saved as {filename}")
                    };
                }
                Ok(None) => {
                    s.message = "Finished with no results to export".to_owned();
                }
                Err(err) => {
                    let message = err.to_string();
                    status::record_error(s, DOWNLOAD_KEY, &message);
                    s.message = "Export failed".to_owned();
                }
            }
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_outcomes_are_distinguishable() {
        assert_ne!(StopOutcome::Stopping, StopOutcome::Idle);
    }

    #[test]
    fn start_outcome_error_carries_its_message() {
        let outcome = StartOutcome::Error("not on a listing page".to_owned());
        assert_eq!(
            outcome,
            StartOutcome::Error("not on a listing page".to_owned())
        );
    }
}
