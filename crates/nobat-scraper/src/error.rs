use thiserror::Error;

use crate::browser::BrowserError;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("navigation to {url} did not complete within {timeout_secs}s")]
    NavigationTimeout { url: String, timeout_secs: u64 },

    #[error("profile tab was closed while navigating to {url}")]
    TabGone { url: String },

    #[error("active tab is not a {host} listing page (found {found})")]
    NotOnListingPage { host: String, found: String },

    #[error("invalid profile URL \"{url}\": {reason}")]
    InvalidProfileUrl { url: String, reason: String },

    #[error("extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("unexpected agent response to {request}")]
    UnexpectedAgentResponse { request: &'static str },

    #[error("export failed: {reason}")]
    Export { reason: String },
}

impl ScrapeError {
    /// Transient per-profile errors are retried; everything else either
    /// aborts the current step immediately or is handled at the boundary
    /// where it occurs.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapeError::NavigationTimeout { .. }
            | ScrapeError::TabGone { .. }
            | ScrapeError::Extraction { .. }
            | ScrapeError::UnexpectedAgentResponse { .. } => true,
            ScrapeError::Browser(err) => err.is_transient(),
            ScrapeError::NotOnListingPage { .. }
            | ScrapeError::InvalidProfileUrl { .. }
            | ScrapeError::Export { .. } => false,
        }
    }
}
