//! Offline [`Browser`] backend over saved HTML files.
//!
//! Maps URLs onto files in a fixtures directory: a "navigation" reads the
//! file, a "download" writes into the output directory, and the key-value
//! store is mirrored to `state.json` so a run's final status survives the
//! process. Pages are static, so the change-notification channel never
//! fires and load-more clicks report no control.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use base64::Engine as _;
use tokio::sync::watch;

use nobat_scraper::browser::{
    AgentRequest, AgentResponse, Browser, BrowserError, DownloadPayload, TabId, TabInfo,
    TabPlacement,
};
use nobat_scraper::discover::harvest_profile_links;

const STATE_FILE: &str = "state.json";

struct Tab {
    url: String,
    html: String,
}

pub struct FixtureBrowser {
    fixtures: PathBuf,
    output: PathBuf,
    target_host: String,
    tabs: Mutex<HashMap<u64, Tab>>,
    active: Mutex<Option<TabId>>,
    state: Mutex<HashMap<String, serde_json::Value>>,
    next_id: AtomicU64,
    changes: watch::Sender<u64>,
}

impl FixtureBrowser {
    pub fn new(
        fixtures: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        target_host: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let output = output.into();
        fs::create_dir_all(&output)?;
        let (changes, _) = watch::channel(0u64);
        Ok(Self {
            fixtures: fixtures.into(),
            output,
            target_host: target_host.into(),
            tabs: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            state: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            changes,
        })
    }

    /// Opens the listing fixture as the active tab, the position a real
    /// operator would start a run from.
    pub fn open_listing(&self, url: &str) -> anyhow::Result<TabId> {
        let html = self.load(url).map_err(|err| anyhow::anyhow!("{err}"))?;
        let id = TabId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tabs.lock().expect("tabs lock").insert(
            id.0,
            Tab {
                url: url.to_owned(),
                html,
            },
        );
        *self.active.lock().expect("active lock") = Some(id);
        Ok(id)
    }

    /// `https://host/a/b?q` → `<fixtures>/host_a_b_q.html`.
    fn fixture_path(&self, url: &str) -> PathBuf {
        let trimmed = url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        let slug: String = trimmed
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.fixtures.join(format!("{slug}.html"))
    }

    fn load(&self, url: &str) -> Result<String, BrowserError> {
        let path = self.fixture_path(url);
        fs::read_to_string(&path).map_err(|err| BrowserError::Navigation {
            url: url.to_owned(),
            reason: format!("no fixture at {}: {err}", path.display()),
        })
    }

    fn with_tab<T>(&self, tab: TabId, f: impl FnOnce(&Tab) -> T) -> Result<T, BrowserError> {
        let tabs = self.tabs.lock().expect("tabs lock");
        tabs.get(&tab.0).map(f).ok_or(BrowserError::NoSuchTab(tab))
    }

    fn flush_state(&self, state: &HashMap<String, serde_json::Value>) -> Result<(), BrowserError> {
        let path = self.output.join(STATE_FILE);
        let body = serde_json::to_string_pretty(state).map_err(|err| {
            BrowserError::Persistence {
                key: STATE_FILE.to_owned(),
                reason: err.to_string(),
            }
        })?;
        fs::write(&path, body).map_err(|err| BrowserError::Persistence {
            key: STATE_FILE.to_owned(),
            reason: err.to_string(),
        })
    }

    fn write_output(&self, filename: &str, bytes: &[u8]) -> Result<(), BrowserError> {
        let path = self.output.join(filename);
        fs::write(&path, bytes).map_err(|err| BrowserError::Download {
            reason: format!("{}: {err}", path.display()),
        })
    }
}

impl Browser for FixtureBrowser {
    async fn create_tab(&self, url: &str, _placement: TabPlacement) -> Result<TabId, BrowserError> {
        let html = self.load(url)?;
        let id = TabId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tabs.lock().expect("tabs lock").insert(
            id.0,
            Tab {
                url: url.to_owned(),
                html,
            },
        );
        Ok(id)
    }

    async fn navigate(&self, tab: TabId, url: &str) -> Result<(), BrowserError> {
        let html = self.load(url)?;
        let mut tabs = self.tabs.lock().expect("tabs lock");
        let entry = tabs.get_mut(&tab.0).ok_or(BrowserError::NoSuchTab(tab))?;
        entry.url = url.to_owned();
        entry.html = html;
        Ok(())
    }

    async fn close_tab(&self, tab: TabId) -> Result<(), BrowserError> {
        self.tabs
            .lock()
            .expect("tabs lock")
            .remove(&tab.0)
            .map(|_| ())
            .ok_or(BrowserError::NoSuchTab(tab))
    }

    async fn active_tab(&self) -> Result<TabInfo, BrowserError> {
        let active = self
            .active
            .lock()
            .expect("active lock")
            .ok_or_else(|| BrowserError::Backend("no active tab opened".to_owned()))?;
        self.tab_info(active).await
    }

    async fn tab_info(&self, tab: TabId) -> Result<TabInfo, BrowserError> {
        self.with_tab(tab, |t| TabInfo {
            id: tab,
            url: t.url.clone(),
            window_id: Some(1),
            index: Some(0),
        })
    }

    async fn wait_for_load(&self, tab: TabId) -> Result<(), BrowserError> {
        // Fixture pages are ready as soon as the file is read.
        self.with_tab(tab, |_| ())
    }

    fn dom_changes(&self, _tab: TabId) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    async fn inject_agent(&self, tab: TabId) -> Result<(), BrowserError> {
        self.with_tab(tab, |_| ())
    }

    async fn message_agent(
        &self,
        tab: TabId,
        request: AgentRequest,
    ) -> Result<AgentResponse, BrowserError> {
        let host = self.target_host.clone();
        self.with_tab(tab, |t| match request {
            AgentRequest::Snapshot => AgentResponse::Html {
                html: t.html.clone(),
            },
            AgentRequest::CardCount => AgentResponse::Count {
                count: harvest_profile_links(&t.html, &host).len(),
            },
            AgentRequest::ClickLoadMore => AgentResponse::Clicked { clicked: false },
            AgentRequest::RevealHiddenPhones => AgentResponse::Revealed { revealed: 0 },
            AgentRequest::HasName => AgentResponse::Present {
                present: t.html.contains("<h1") || t.html.contains("data-doctor-name"),
            },
        })
    }

    async fn state_get(&self, key: &str) -> Result<Option<serde_json::Value>, BrowserError> {
        Ok(self.state.lock().expect("state lock").get(key).cloned())
    }

    async fn state_set(&self, key: &str, value: serde_json::Value) -> Result<(), BrowserError> {
        let mut state = self.state.lock().expect("state lock");
        state.insert(key.to_owned(), value);
        self.flush_state(&state)
    }

    async fn download(&self, filename: &str, payload: DownloadPayload) -> Result<(), BrowserError> {
        match payload {
            DownloadPayload::Bytes(bytes) => self.write_output(filename, &bytes),
            DownloadPayload::DataUri(uri) => {
                let encoded = uri.rsplit_once("base64,").map(|(_, rest)| rest).ok_or(
                    BrowserError::Download {
                        reason: "malformed data URI".to_owned(),
                    },
                )?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|err| BrowserError::Download {
                        reason: format!("data URI decode: {err}"),
                    })?;
                self.write_output(filename, &bytes)
            }
        }
    }
}
