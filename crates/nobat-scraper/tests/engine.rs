//! End-to-end engine tests over a scripted in-memory browser backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Notify};

use nobat_core::{AppConfig, RunState, ScrapeConfig};
use nobat_scraper::browser::{
    AgentRequest, AgentResponse, Browser, BrowserError, DownloadPayload, TabId, TabInfo,
    TabPlacement,
};
use nobat_scraper::controller::{Controller, StartOutcome, StopOutcome};
use nobat_scraper::discover::harvest_profile_links;

const HOST: &str = "nobat.ir";
const LISTING_URL: &str = "https://nobat.ir/search/tehran";

fn listing_html() -> String {
    r#"
        <html><body>
        <div class="doctor-card"><a href="/dr/a">دکتر الف</a></div>
        <div class="doctor-card"><a href="/dr/b">دکتر ب</a></div>
        <div class="doctor-card"><a href="/dr/c">دکتر ج</a></div>
        </body></html>
    "#
    .to_owned()
}

fn profile_html(name: &str, phone: &str) -> String {
    format!(
        r#"<html><body><h1>{name}</h1><span class="phone">{phone}</span></body></html>"#
    )
}

#[derive(Default)]
struct Script {
    listing_html: String,
    profiles: HashMap<String, String>,
    /// URLs whose load wait always fails.
    failing: HashSet<String>,
    /// URLs whose load wait blocks until the gate is released.
    gates: HashMap<String, Arc<Notify>>,
    fail_byte_downloads: bool,
    fail_all_downloads: bool,
    /// The listing tab's agent answers nothing until a second injection.
    lose_listing_agent: bool,
}

struct Inner {
    script: Script,
    tabs: Mutex<HashMap<u64, String>>,
    next_id: AtomicU64,
    load_waits: Mutex<HashMap<String, u32>>,
    injections: Mutex<HashMap<u64, u32>>,
    state: Mutex<HashMap<String, serde_json::Value>>,
    downloads: Mutex<Vec<(String, DownloadPayload)>>,
    changes: watch::Sender<u64>,
}

#[derive(Clone)]
struct ScriptedBrowser {
    inner: Arc<Inner>,
}

impl ScriptedBrowser {
    fn new(script: Script) -> Self {
        let (changes, _) = watch::channel(0u64);
        let mut tabs = HashMap::new();
        // Tab 1 is the operator's listing tab.
        tabs.insert(1, LISTING_URL.to_owned());
        Self {
            inner: Arc::new(Inner {
                script,
                tabs: Mutex::new(tabs),
                next_id: AtomicU64::new(2),
                load_waits: Mutex::new(HashMap::new()),
                injections: Mutex::new(HashMap::new()),
                state: Mutex::new(HashMap::new()),
                downloads: Mutex::new(Vec::new()),
                changes,
            }),
        }
    }

    fn html_for(&self, url: &str) -> String {
        if url == LISTING_URL {
            self.inner.script.listing_html.clone()
        } else {
            self.inner
                .script
                .profiles
                .get(url)
                .cloned()
                .unwrap_or_else(|| "<html></html>".to_owned())
        }
    }

    fn tab_url(&self, tab: TabId) -> Result<String, BrowserError> {
        self.inner
            .tabs
            .lock()
            .unwrap()
            .get(&tab.0)
            .cloned()
            .ok_or(BrowserError::NoSuchTab(tab))
    }

    fn load_waits(&self, url: &str) -> u32 {
        self.inner
            .load_waits
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    fn downloads(&self) -> Vec<(String, DownloadPayload)> {
        self.inner.downloads.lock().unwrap().clone()
    }

    fn persisted(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.state.lock().unwrap().get(key).cloned()
    }
}

impl Browser for ScriptedBrowser {
    async fn create_tab(&self, url: &str, _placement: TabPlacement) -> Result<TabId, BrowserError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.tabs.lock().unwrap().insert(id, url.to_owned());
        Ok(TabId(id))
    }

    async fn navigate(&self, tab: TabId, url: &str) -> Result<(), BrowserError> {
        let mut tabs = self.inner.tabs.lock().unwrap();
        let entry = tabs.get_mut(&tab.0).ok_or(BrowserError::NoSuchTab(tab))?;
        *entry = url.to_owned();
        Ok(())
    }

    async fn close_tab(&self, tab: TabId) -> Result<(), BrowserError> {
        self.inner
            .tabs
            .lock()
            .unwrap()
            .remove(&tab.0)
            .map(|_| ())
            .ok_or(BrowserError::NoSuchTab(tab))
    }

    async fn active_tab(&self) -> Result<TabInfo, BrowserError> {
        self.tab_info(TabId(1)).await
    }

    async fn tab_info(&self, tab: TabId) -> Result<TabInfo, BrowserError> {
        let url = self.tab_url(tab)?;
        Ok(TabInfo {
            id: tab,
            url,
            window_id: Some(1),
            index: Some(0),
        })
    }

    async fn wait_for_load(&self, tab: TabId) -> Result<(), BrowserError> {
        let url = self.tab_url(tab)?;
        *self
            .inner
            .load_waits
            .lock()
            .unwrap()
            .entry(url.clone())
            .or_insert(0) += 1;
        if let Some(gate) = self.inner.script.gates.get(&url) {
            gate.notified().await;
        }
        if self.inner.script.failing.contains(&url) {
            return Err(BrowserError::Navigation {
                url,
                reason: "scripted failure".to_owned(),
            });
        }
        Ok(())
    }

    fn dom_changes(&self, _tab: TabId) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    async fn inject_agent(&self, tab: TabId) -> Result<(), BrowserError> {
        self.tab_url(tab)?;
        *self
            .inner
            .injections
            .lock()
            .unwrap()
            .entry(tab.0)
            .or_insert(0) += 1;
        Ok(())
    }

    async fn message_agent(
        &self,
        tab: TabId,
        request: AgentRequest,
    ) -> Result<AgentResponse, BrowserError> {
        let url = self.tab_url(tab)?;
        if self.inner.script.lose_listing_agent && tab.0 == 1 {
            let injections = self
                .inner
                .injections
                .lock()
                .unwrap()
                .get(&tab.0)
                .copied()
                .unwrap_or(0);
            if injections < 2 {
                return Err(BrowserError::NoReceiver(tab));
            }
        }
        let html = self.html_for(&url);
        Ok(match request {
            AgentRequest::Snapshot => AgentResponse::Html { html },
            AgentRequest::CardCount => AgentResponse::Count {
                count: harvest_profile_links(&html, HOST).len(),
            },
            AgentRequest::ClickLoadMore => AgentResponse::Clicked { clicked: false },
            AgentRequest::RevealHiddenPhones => AgentResponse::Revealed { revealed: 0 },
            AgentRequest::HasName => AgentResponse::Present {
                present: html.contains("<h1"),
            },
        })
    }

    async fn state_get(&self, key: &str) -> Result<Option<serde_json::Value>, BrowserError> {
        Ok(self.inner.state.lock().unwrap().get(key).cloned())
    }

    async fn state_set(&self, key: &str, value: serde_json::Value) -> Result<(), BrowserError> {
        self.inner.state.lock().unwrap().insert(key.to_owned(), value);
        Ok(())
    }

    async fn download(&self, filename: &str, payload: DownloadPayload) -> Result<(), BrowserError> {
        if self.inner.script.fail_all_downloads {
            return Err(BrowserError::Download {
                reason: "scripted download failure".to_owned(),
            });
        }
        if self.inner.script.fail_byte_downloads
            && matches!(payload, DownloadPayload::Bytes(_))
        {
            return Err(BrowserError::Download {
                reason: "scripted byte failure".to_owned(),
            });
        }
        self.inner
            .downloads
            .lock()
            .unwrap()
            .push((filename.to_owned(), payload));
        Ok(())
    }
}

fn app_config() -> AppConfig {
    AppConfig {
        target_host: HOST.to_owned(),
        log_level: "warn".to_owned(),
        delay_ms: 0,
        max_retries: 0,
        nav_timeout_secs: 5,
        link_wait_secs: 1,
        growth_wait_secs: 1,
        name_wait_secs: 1,
        max_load_more_rounds: 2,
    }
}

fn three_profile_script() -> Script {
    let mut profiles = HashMap::new();
    profiles.insert(
        "https://nobat.ir/dr/a".to_owned(),
        profile_html("دکتر الف", "02111111111"),
    );
    profiles.insert(
        "https://nobat.ir/dr/c".to_owned(),
        profile_html("دکتر ج", "02133333333"),
    );
    Script {
        listing_html: listing_html(),
        profiles,
        failing: HashSet::from(["https://nobat.ir/dr/b".to_owned()]),
        ..Script::default()
    }
}

fn config(delay_ms: u64, max_retries: u32) -> ScrapeConfig {
    ScrapeConfig {
        delay_ms,
        max_retries,
        ..ScrapeConfig::default()
    }
}

fn csv_text(payload: &DownloadPayload) -> String {
    match payload {
        DownloadPayload::Bytes(bytes) => String::from_utf8(bytes.clone()).unwrap(),
        DownloadPayload::DataUri(_) => panic!("expected a bytes payload"),
    }
}

// ---------------------------------------------------------------------------
// full runs
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failing_profile_yields_placeholder_and_run_completes() {
    let browser = ScriptedBrowser::new(three_profile_script());
    let handle = browser.clone();
    let controller = Controller::new(browser, app_config());

    assert_eq!(controller.start(Some(config(0, 0))).await, StartOutcome::Started);
    controller.wait_until_idle().await;

    let status = controller.status();
    assert_eq!(status.state, RunState::Idle);
    assert_eq!(status.counts.total, 3);
    assert_eq!(status.counts.processed, 3);
    assert_eq!(status.errors.len(), 1);
    assert_eq!(status.errors[0].url, "https://nobat.ir/dr/b");

    // One CSV download: header plus one row per queued URL.
    let downloads = handle.downloads();
    assert_eq!(downloads.len(), 1);
    assert!(downloads[0].0.starts_with("nobat-doctors-2"));
    assert!(!downloads[0].0.contains("partial"));
    let csv = csv_text(&downloads[0].1);
    let lines: Vec<&str> = csv.trim_start_matches('\u{FEFF}').lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[1].contains("https://nobat.ir/dr/a"));
    assert!(lines[1].contains("دکتر الف"));
    assert!(lines[2].contains("https://nobat.ir/dr/b"));
    assert!(lines[2].contains("scripted failure"));
    assert!(lines[3].contains("02133333333"));

    // Status was persisted wholesale, and the profile tab was closed.
    assert!(handle.persisted("status").is_some());
    assert_eq!(handle.inner.tabs.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_budget_bounds_attempts_exactly() {
    let mut script = three_profile_script();
    script.listing_html = r#"<a href="/dr/b">دکتر ب</a>"#.to_owned();
    let browser = ScriptedBrowser::new(script);
    let handle = browser.clone();
    let controller = Controller::new(browser, app_config());

    assert_eq!(controller.start(Some(config(0, 2))).await, StartOutcome::Started);
    controller.wait_until_idle().await;

    // max_retries = 2 means exactly three load attempts, never four.
    assert_eq!(handle.load_waits("https://nobat.ir/dr/b"), 3);
    let status = controller.status();
    assert_eq!(status.counts.processed, 1);
    assert_eq!(status.errors.len(), 1);
    assert!(status.retry.is_none());
}

#[tokio::test(start_paused = true)]
async fn stop_finishes_current_profile_and_exports_partial() {
    let gate = Arc::new(Notify::new());
    let mut script = three_profile_script();
    script.failing.clear();
    script.profiles.insert(
        "https://nobat.ir/dr/b".to_owned(),
        profile_html("دکتر ب", "02122222222"),
    );
    script
        .gates
        .insert("https://nobat.ir/dr/b".to_owned(), Arc::clone(&gate));
    let browser = ScriptedBrowser::new(script);
    let handle = browser.clone();
    let controller = Controller::new(browser, app_config());

    assert_eq!(controller.start(Some(config(0, 0))).await, StartOutcome::Started);

    let mut status_rx = controller.subscribe();
    status_rx
        .wait_for(|s| s.counts.processed == 1)
        .await
        .unwrap();

    assert_eq!(controller.stop().await, StopOutcome::Stopping);
    // The stopping transition is persisted before the run winds down.
    let stopping = handle.persisted("status").unwrap();
    assert_eq!(stopping["state"], "stopping");
    gate.notify_one();
    controller.wait_until_idle().await;

    let status = controller.status();
    assert_eq!(status.counts.processed, 2);
    assert_eq!(status.counts.pending, 1);
    assert!(status.errors.is_empty());

    let downloads = handle.downloads();
    assert_eq!(downloads.len(), 1);
    assert!(downloads[0].0.starts_with("nobat-doctors-partial-"));
    let csv = csv_text(&downloads[0].1);
    assert_eq!(csv.trim_start_matches('\u{FEFF}').lines().count(), 3);
}

// ---------------------------------------------------------------------------
// control surface
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn second_start_reports_already_running() {
    let gate = Arc::new(Notify::new());
    let mut script = three_profile_script();
    script.failing.clear();
    script
        .gates
        .insert("https://nobat.ir/dr/a".to_owned(), Arc::clone(&gate));
    let browser = ScriptedBrowser::new(script);
    let controller = Controller::new(browser, app_config());

    assert_eq!(controller.start(Some(config(0, 0))).await, StartOutcome::Started);
    assert_eq!(
        controller.start(Some(config(0, 0))).await,
        StartOutcome::AlreadyRunning
    );

    gate.notify_one();
    controller.stop().await;
    gate.notify_one();
    controller.wait_until_idle().await;
}

#[tokio::test(start_paused = true)]
async fn start_refuses_foreign_active_tab() {
    let browser = ScriptedBrowser::new(three_profile_script());
    browser
        .inner
        .tabs
        .lock()
        .unwrap()
        .insert(1, "https://other.ir/search".to_owned());
    let controller = Controller::new(browser, app_config());

    match controller.start(Some(config(0, 0))).await {
        StartOutcome::Error(message) => assert!(message.contains("listing page")),
        other => panic!("expected an error outcome, got {other:?}"),
    }
    let status = controller.status();
    assert_eq!(status.state, RunState::Idle);
    assert_eq!(status.errors[0].url, "global");
}

#[tokio::test(start_paused = true)]
async fn stop_when_idle_is_a_no_op() {
    let browser = ScriptedBrowser::new(three_profile_script());
    let controller = Controller::new(browser, app_config());
    assert_eq!(controller.stop().await, StopOutcome::Idle);
}

#[tokio::test(start_paused = true)]
async fn empty_listing_reports_no_links() {
    let mut script = three_profile_script();
    script.listing_html = "<html><body>هیچ</body></html>".to_owned();
    let browser = ScriptedBrowser::new(script);
    let controller = Controller::new(browser, app_config());

    assert_eq!(controller.start(Some(config(0, 0))).await, StartOutcome::NoLinks);
    assert_eq!(controller.status().state, RunState::Idle);
}

#[tokio::test(start_paused = true)]
async fn update_config_clamps_and_persists() {
    let browser = ScriptedBrowser::new(three_profile_script());
    let handle = browser.clone();
    let controller = Controller::new(browser, app_config());

    let applied = controller
        .update_config(ScrapeConfig {
            delay_ms: 10,
            max_retries: 99,
            ..ScrapeConfig::default()
        })
        .await;
    assert_eq!(applied.max_retries, 5);

    let persisted = handle.persisted("config").unwrap();
    assert_eq!(persisted["max_retries"], 5);
    assert_eq!(persisted["delay_ms"], 10);
}

#[tokio::test(start_paused = true)]
async fn lost_listing_agent_is_reinjected_and_discovery_recovers() {
    let mut script = three_profile_script();
    script.lose_listing_agent = true;
    let browser = ScriptedBrowser::new(script);
    let handle = browser.clone();
    let controller = Controller::new(browser, app_config());

    assert_eq!(controller.start(Some(config(0, 0))).await, StartOutcome::Started);
    controller.wait_until_idle().await;

    let status = controller.status();
    assert_eq!(status.counts.total, 3);
    assert_eq!(status.counts.processed, 3);
    // One initial injection, one recovery after the lost agent.
    assert_eq!(
        handle.inner.injections.lock().unwrap().get(&1).copied(),
        Some(2)
    );
}

// ---------------------------------------------------------------------------
// export fallback
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn byte_download_failure_falls_back_to_data_uri() {
    let mut script = three_profile_script();
    script.fail_byte_downloads = true;
    let browser = ScriptedBrowser::new(script);
    let handle = browser.clone();
    let controller = Controller::new(browser, app_config());

    assert_eq!(controller.start(Some(config(0, 0))).await, StartOutcome::Started);
    controller.wait_until_idle().await;

    let downloads = handle.downloads();
    assert_eq!(downloads.len(), 1);
    match &downloads[0].1 {
        DownloadPayload::DataUri(uri) => {
            assert!(uri.starts_with("data:text/csv;charset=utf-8;base64,"));
        }
        DownloadPayload::Bytes(_) => panic!("expected the data URI fallback"),
    }
    // The failed byte path leaves no error: the fallback delivered.
    let status = controller.status();
    assert!(status.errors.iter().all(|e| e.url != "download"));
}

#[tokio::test(start_paused = true)]
async fn double_download_failure_records_export_error() {
    let mut script = three_profile_script();
    script.fail_all_downloads = true;
    let browser = ScriptedBrowser::new(script);
    let handle = browser.clone();
    let controller = Controller::new(browser, app_config());

    assert_eq!(controller.start(Some(config(0, 0))).await, StartOutcome::Started);
    controller.wait_until_idle().await;

    let status = controller.status();
    assert_eq!(status.state, RunState::Idle);
    assert_eq!(status.message, "Export failed");
    let entry = status.errors.iter().find(|e| e.url == "download").unwrap();
    assert!(entry.message.contains("scripted download failure"));
    assert!(handle.downloads().is_empty());
}
