//! Profile-tab session lifecycle.
//!
//! The engine owns at most one secondary tab for visiting profile pages.
//! [`SessionManager::ensure`] reuses it by navigation when it is still
//! responsive and recreates it otherwise; teardown is idempotent and
//! silences "already gone" errors. A tab disappearing while a navigation
//! wait is in flight fails that attempt, never the whole run.

use std::time::Duration;

use crate::browser::{AgentRequest, AgentResponse, Browser, BrowserError, TabId, TabInfo, TabPlacement};
use crate::error::ScrapeError;

pub struct SessionManager<'b, B: Browser> {
    browser: &'b B,
    /// The listing tab the run started from; new profile tabs are placed
    /// next to it in the same window.
    opener: Option<TabInfo>,
    nav_timeout: Duration,
    tab: Option<TabId>,
}

impl<'b, B: Browser> SessionManager<'b, B> {
    pub fn new(browser: &'b B, opener: Option<TabInfo>, nav_timeout: Duration) -> Self {
        Self {
            browser,
            opener,
            nav_timeout,
            tab: None,
        }
    }

    #[must_use]
    pub fn tab(&self) -> Option<TabId> {
        self.tab
    }

    /// Change-notification subscription for the current session tab, when
    /// one exists.
    #[must_use]
    pub fn dom_changes(&self) -> Option<tokio::sync::watch::Receiver<u64>> {
        self.tab.map(|tab| self.browser.dom_changes(tab))
    }

    /// Navigates the session to `url`, reusing the existing tab when it is
    /// still responsive and creating a fresh one otherwise, then waits for
    /// navigation completion (bounded) and injects the extraction agent.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::NavigationTimeout`] when the load wait expires.
    /// - [`ScrapeError::TabGone`] when the tab disappears mid-wait.
    /// - [`ScrapeError::Browser`] for backend failures during creation or
    ///   injection.
    pub async fn ensure(&mut self, url: &str) -> Result<TabId, ScrapeError> {
        if let Some(tab) = self.tab {
            match self.browser.navigate(tab, url).await {
                Ok(()) => {
                    self.await_load(tab, url).await?;
                    self.browser.inject_agent(tab).await?;
                    return Ok(tab);
                }
                Err(err) => {
                    tracing::debug!(%tab, error = %err, "profile tab unresponsive; recreating");
                    if let Err(close_err) = self.teardown().await {
                        tracing::warn!(%tab, error = %close_err, "failed to close stale profile tab");
                    }
                }
            }
        }

        let placement = TabPlacement {
            window_id: self.opener.as_ref().and_then(|o| o.window_id),
            index: self.opener.as_ref().and_then(|o| o.index).map(|i| i + 1),
            discardable: true,
        };
        let tab = self.browser.create_tab(url, placement).await?;
        self.tab = Some(tab);
        self.await_load(tab, url).await?;
        self.browser.inject_agent(tab).await?;
        Ok(tab)
    }

    async fn await_load(&mut self, tab: TabId, url: &str) -> Result<(), ScrapeError> {
        match tokio::time::timeout(self.nav_timeout, self.browser.wait_for_load(tab)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(BrowserError::NoSuchTab(_))) => {
                // The tab died while we were waiting: terminal for this
                // attempt only.
                self.tab = None;
                Err(ScrapeError::TabGone {
                    url: url.to_owned(),
                })
            }
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(ScrapeError::NavigationTimeout {
                url: url.to_owned(),
                timeout_secs: self.nav_timeout.as_secs(),
            }),
        }
    }

    /// Sends one request to the in-page agent. A "no receiver" failure is
    /// recovered by re-injecting the agent and retrying exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Browser`] when messaging fails for any other
    /// reason, or when no session tab exists.
    pub async fn message(&mut self, request: AgentRequest) -> Result<AgentResponse, ScrapeError> {
        let Some(tab) = self.tab else {
            return Err(ScrapeError::Browser(BrowserError::Backend(
                "agent message sent with no active profile tab".to_owned(),
            )));
        };
        match self.browser.message_agent(tab, request.clone()).await {
            Ok(response) => Ok(response),
            Err(BrowserError::NoReceiver(_)) => {
                tracing::debug!(%tab, op = request.op_name(), "agent gone; re-injecting");
                self.browser.inject_agent(tab).await?;
                Ok(self.browser.message_agent(tab, request).await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Closes the session tab if one exists. Idempotent; an already-gone
    /// tab is not an error.
    ///
    /// # Errors
    ///
    /// Returns the backend error when closing fails for any reason other
    /// than the tab already being gone.
    pub async fn teardown(&mut self) -> Result<(), BrowserError> {
        if let Some(tab) = self.tab.take() {
            match self.browser.close_tab(tab).await {
                Ok(()) | Err(BrowserError::NoSuchTab(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
