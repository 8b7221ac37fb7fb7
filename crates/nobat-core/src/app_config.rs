/// Immutable process configuration, loaded once at startup from
/// environment variables (see [`crate::config::load_app_config`]).
///
/// Runtime-updatable settings live in [`crate::ScrapeConfig`]; everything
/// here is fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host the crawl is locked to; links resolving elsewhere are dropped.
    pub target_host: String,
    pub log_level: String,
    /// Default inter-visit delay, seed for the persisted `ScrapeConfig`.
    pub delay_ms: u64,
    /// Default retry budget, seed for the persisted `ScrapeConfig`.
    pub max_retries: u32,
    /// Bound on waiting for a profile tab to finish navigating.
    pub nav_timeout_secs: u64,
    /// Bound on waiting for the first profile link on the listing page.
    pub link_wait_secs: u64,
    /// Bound on waiting for the card count to grow after a "load more" click.
    pub growth_wait_secs: u64,
    /// Bound on waiting for a name-bearing element on a profile page.
    pub name_wait_secs: u64,
    /// Cap on "load more" expansion rounds on the listing page.
    pub max_load_more_rounds: u32,
}
