//! Profile-link discovery on the listing page.
//!
//! The listing renders cards incrementally: an initial batch, then more on
//! each "load more" activation. Discovery waits (bounded) for the first
//! cards, expands the listing until the control disappears, growth stops,
//! or the round cap is reached, and harvests profile links from the final
//! snapshot.

use std::collections::HashSet;
use std::time::Duration;

use nobat_core::AppConfig;

use crate::browser::{AgentRequest, AgentResponse, Browser, BrowserError, TabId};
use crate::error::ScrapeError;
use crate::site;
use crate::urls;
use crate::wait::ChangeWait;

/// Outcome of one discovery pass over the listing tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Canonical profile URLs in first-seen document order.
    pub links: Vec<String>,
    /// How many "load more" rounds actually expanded the listing.
    pub rounds: u32,
}

/// Expands the listing in `tab` and harvests every profile link.
///
/// # Errors
///
/// Returns [`ScrapeError`] when agent injection, messaging, or the final
/// snapshot fails. An empty listing is not an error — the report simply
/// carries no links.
pub async fn discover_links<B: Browser>(
    browser: &B,
    tab: TabId,
    app: &AppConfig,
) -> Result<DiscoveryReport, ScrapeError> {
    browser.inject_agent(tab).await?;

    // Initial cards render asynchronously; give them a bounded window.
    let mut wait = ChangeWait::new(
        browser.dom_changes(tab),
        Duration::from_secs(app.link_wait_secs),
    );
    loop {
        if card_count(browser, tab).await? > 0 {
            break;
        }
        if !wait.tick().await {
            tracing::debug!(%tab, "no listing cards appeared in time");
            break;
        }
    }

    let mut rounds = 0u32;
    while rounds < app.max_load_more_rounds {
        let before = card_count(browser, tab).await?;

        let clicked = match agent_request(browser, tab, AgentRequest::ClickLoadMore).await? {
            AgentResponse::Clicked { clicked } => clicked,
            _ => {
                return Err(ScrapeError::UnexpectedAgentResponse {
                    request: "click_load_more",
                })
            }
        };
        if !clicked {
            break;
        }

        let mut growth = ChangeWait::new(
            browser.dom_changes(tab),
            Duration::from_secs(app.growth_wait_secs),
        );
        let grew = loop {
            if card_count(browser, tab).await? > before {
                break true;
            }
            if !growth.tick().await {
                break false;
            }
        };
        if !grew {
            tracing::debug!(%tab, rounds, "load-more click produced no new cards");
            break;
        }
        rounds += 1;
    }

    let html = match agent_request(browser, tab, AgentRequest::Snapshot).await? {
        AgentResponse::Html { html } => html,
        _ => {
            return Err(ScrapeError::UnexpectedAgentResponse {
                request: "snapshot",
            })
        }
    };

    let links = harvest_profile_links(&html, &app.target_host);
    tracing::info!(%tab, links = links.len(), rounds, "listing discovery finished");
    Ok(DiscoveryReport { links, rounds })
}

async fn card_count<B: Browser>(browser: &B, tab: TabId) -> Result<usize, ScrapeError> {
    match agent_request(browser, tab, AgentRequest::CardCount).await? {
        AgentResponse::Count { count } => Ok(count),
        _ => Err(ScrapeError::UnexpectedAgentResponse {
            request: "card_count",
        }),
    }
}

/// Sends one request to the listing-page agent. A "no receiver" failure
/// is recovered by re-injecting the agent and retrying exactly once, the
/// same recovery the profile session applies.
async fn agent_request<B: Browser>(
    browser: &B,
    tab: TabId,
    request: AgentRequest,
) -> Result<AgentResponse, ScrapeError> {
    match browser.message_agent(tab, request.clone()).await {
        Ok(response) => Ok(response),
        Err(BrowserError::NoReceiver(_)) => {
            tracing::debug!(%tab, op = request.op_name(), "listing agent gone; re-injecting");
            browser.inject_agent(tab).await?;
            Ok(browser.message_agent(tab, request).await?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Harvests profile links from a listing snapshot: anchor targets first,
/// then the data attributes listing cards carry, canonicalized and
/// deduplicated in first-seen order.
#[must_use]
pub fn harvest_profile_links(html: &str, target_host: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let mut push = |raw: &str| {
        let Some(url) = urls::canonicalize(raw, target_host) else {
            return;
        };
        if !site::is_profile_url(&url) {
            return;
        }
        if seen.insert(url.clone()) {
            links.push(url);
        }
    };

    for (href, _text) in crate::dom::anchors(html) {
        push(&href);
    }
    for attr in site::PROFILE_URL_ATTRS {
        for value in crate::dom::attr_values(html, attr) {
            push(&value);
        }
    }

    links
}
