//! Sequential work queue for one scrape run.
//!
//! A [`ScrapeJob`] owns the discovered link list, a monotone cursor, the
//! visited set, and the accumulated results. Duplicate links are skipped
//! without producing a result or burning retries; the cursor never moves
//! backwards.

use std::collections::HashSet;

use nobat_core::{DoctorRecord, ProgressCounts};

#[derive(Debug, Default)]
pub struct ScrapeJob {
    links: Vec<String>,
    cursor: usize,
    visited: HashSet<String>,
    results: Vec<DoctorRecord>,
}

impl ScrapeJob {
    #[must_use]
    pub fn new(links: Vec<String>) -> Self {
        Self {
            links,
            ..Self::default()
        }
    }

    /// Next unvisited URL, marking it visited and advancing the cursor
    /// past it. Returns `None` when the list is exhausted.
    pub fn next_url(&mut self) -> Option<String> {
        while self.cursor < self.links.len() {
            let url = self.links[self.cursor].clone();
            self.cursor += 1;
            if self.visited.insert(url.clone()) {
                return Some(url);
            }
            tracing::debug!(url, "skipping already-visited link");
        }
        None
    }

    pub fn push_result(&mut self, record: DoctorRecord) {
        self.results.push(record);
    }

    #[must_use]
    pub fn results(&self) -> &[DoctorRecord] {
        &self.results
    }

    #[must_use]
    pub fn into_results(self) -> Vec<DoctorRecord> {
        self.results
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.links.len()
    }

    #[must_use]
    pub fn counts(&self) -> ProgressCounts {
        ProgressCounts {
            total: self.links.len(),
            processed: self.results.len(),
            pending: self.links.len() - self.cursor,
        }
    }
}
