//! Scraper engine for the nobat.ir doctor directory.
//!
//! The engine is split the same way the data flows: [`discover`] expands
//! the listing page and harvests profile links, [`controller`] drives the
//! sequential work queue over a [`browser::Browser`] collaborator,
//! [`extract`] pulls raw contact data out of each profile page,
//! [`reconcile`] merges the heterogeneous candidates into one canonical
//! record, and [`export`] emits the CSV artifact.

pub mod browser;
pub mod controller;
pub mod discover;
pub mod dom;
pub mod error;
pub mod export;
pub mod extract;
pub mod normalize;
pub mod queue;
pub mod reconcile;
pub mod session;
pub mod site;
pub mod status;
pub mod structured;
pub mod urls;
pub mod wait;

pub use browser::{AgentRequest, AgentResponse, Browser, BrowserError, DownloadPayload, TabId};
pub use controller::{Controller, StartOutcome, StopOutcome};
pub use error::ScrapeError;
