//! Browser-automation collaborator boundary.
//!
//! The engine never talks to a real browser directly: everything it needs
//! — tabs, navigation, an injected in-page agent, small durable key-value
//! records, file downloads — is expressed on the [`Browser`] trait as
//! single-result async operations with typed errors. Host backends
//! (extension runtime, devtools protocol, offline fixtures) implement
//! this trait; callback-style error signalling never leaks past it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Opaque tab/session identifier assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// Descriptor of an open tab.
#[derive(Debug, Clone)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    /// Window the tab lives in; new profile tabs are opened next to the
    /// originating listing tab when possible.
    pub window_id: Option<u64>,
    pub index: Option<u32>,
}

/// Placement request for a newly created tab.
#[derive(Debug, Clone, Default)]
pub struct TabPlacement {
    pub window_id: Option<u64>,
    pub index: Option<u32>,
    /// Mark the tab eligible for automatic resource reclamation.
    pub discardable: bool,
}

/// Requests understood by the injected in-page extraction agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AgentRequest {
    /// Full serialized DOM of the page.
    Snapshot,
    /// Number of profile cards currently rendered on the listing page.
    CardCount,
    /// Click the "load more" control if present; reports whether a
    /// control was found and clicked.
    ClickLoadMore,
    /// Click every visible, enabled reveal-phone control in turn, with a
    /// settle delay after each; reports how many were clicked.
    RevealHiddenPhones,
    /// Whether a name-bearing element is present.
    HasName,
}

impl AgentRequest {
    #[must_use]
    pub fn op_name(&self) -> &'static str {
        match self {
            AgentRequest::Snapshot => "snapshot",
            AgentRequest::CardCount => "card_count",
            AgentRequest::ClickLoadMore => "click_load_more",
            AgentRequest::RevealHiddenPhones => "reveal_hidden_phones",
            AgentRequest::HasName => "has_name",
        }
    }
}

/// Responses from the in-page agent, one variant per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentResponse {
    Html { html: String },
    Count { count: usize },
    Clicked { clicked: bool },
    Revealed { revealed: usize },
    Present { present: bool },
}

/// Payload for the export download: the primary path hands the backend
/// raw bytes; the fallback encodes the same bytes as an inline data URI.
/// Both must produce byte-identical file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadPayload {
    Bytes(Vec<u8>),
    DataUri(String),
}

#[derive(Debug, Error)]
pub enum BrowserError {
    /// The tab id does not exist (closed, crashed, or never created).
    #[error("no such tab: {0}")]
    NoSuchTab(TabId),

    /// Message sent to a tab with no agent listening; re-injecting the
    /// agent and retrying once is the prescribed recovery.
    #[error("no receiver in {0}")]
    NoReceiver(TabId),

    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("agent injection failed in {tab}: {reason}")]
    Injection { tab: TabId, reason: String },

    #[error("persistence failed for key {key}: {reason}")]
    Persistence { key: String, reason: String },

    #[error("download failed: {reason}")]
    Download { reason: String },

    #[error("backend error: {0}")]
    Backend(String),
}

impl BrowserError {
    /// Errors worth another attempt on the same URL. `NoSuchTab` is
    /// transient at the per-profile level: the session manager recreates
    /// the tab on the next attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrowserError::NoSuchTab(_)
                | BrowserError::NoReceiver(_)
                | BrowserError::Navigation { .. }
                | BrowserError::Injection { .. }
        )
    }
}

/// Browser-automation primitives the engine requires of its host.
///
/// Semantics the engine relies on:
/// - [`create_tab`](Browser::create_tab) returns the new tab's id;
/// - [`navigate`](Browser::navigate) re-points an existing tab;
/// - [`wait_for_load`](Browser::wait_for_load) resolves when the tab
///   finishes loading and fails with [`BrowserError::NoSuchTab`] if the
///   tab disappears while waiting (callers bound it with a timeout);
/// - [`message_agent`](Browser::message_agent) fails with a
///   distinguishable [`BrowserError::NoReceiver`] when no agent is
///   listening, which triggers re-injection-then-retry exactly once;
/// - [`close_tab`](Browser::close_tab) reports [`BrowserError::NoSuchTab`]
///   for an already-gone tab so callers can silence it;
/// - [`state_set`](Browser::state_set) overwrites the record wholesale.
pub trait Browser: Send + Sync {
    fn create_tab(
        &self,
        url: &str,
        placement: TabPlacement,
    ) -> impl std::future::Future<Output = Result<TabId, BrowserError>> + Send;

    fn navigate(
        &self,
        tab: TabId,
        url: &str,
    ) -> impl std::future::Future<Output = Result<(), BrowserError>> + Send;

    fn close_tab(&self, tab: TabId)
        -> impl std::future::Future<Output = Result<(), BrowserError>> + Send;

    fn active_tab(&self) -> impl std::future::Future<Output = Result<TabInfo, BrowserError>> + Send;

    fn tab_info(
        &self,
        tab: TabId,
    ) -> impl std::future::Future<Output = Result<TabInfo, BrowserError>> + Send;

    fn wait_for_load(
        &self,
        tab: TabId,
    ) -> impl std::future::Future<Output = Result<(), BrowserError>> + Send;

    /// DOM change notifications for a tab: a revision counter that bumps
    /// whenever the page's subtree mutates. Drives bounded predicate
    /// waits without polling.
    fn dom_changes(&self, tab: TabId) -> watch::Receiver<u64>;

    fn inject_agent(
        &self,
        tab: TabId,
    ) -> impl std::future::Future<Output = Result<(), BrowserError>> + Send;

    fn message_agent(
        &self,
        tab: TabId,
        request: AgentRequest,
    ) -> impl std::future::Future<Output = Result<AgentResponse, BrowserError>> + Send;

    fn state_get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, BrowserError>> + Send;

    fn state_set(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), BrowserError>> + Send;

    fn download(
        &self,
        filename: &str,
        payload: DownloadPayload,
    ) -> impl std::future::Future<Output = Result<(), BrowserError>> + Send;
}
