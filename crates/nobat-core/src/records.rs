//! Domain records produced by a scrape run.
//!
//! An [`Office`] groups one clinic location's city, street addresses, and
//! phone numbers. A [`DoctorRecord`] is the canonical per-profile result:
//! top-level `city`/`addresses`/`phones` are the union across all offices
//! plus any page-level fallback values, while `offices` preserves the
//! per-location grouping for the positional CSV columns.

use serde::{Deserialize, Serialize};

/// One clinic/location grouping of city + addresses + phones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    pub city: String,
    pub addresses: Vec<String>,
    pub phones: Vec<String>,
}

impl Office {
    /// An office with no city, no addresses, and no phones carries no
    /// information and must never be stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.city.is_empty() && self.addresses.is_empty() && self.phones.is_empty()
    }

    /// Composite dedup key: two offices that agree on city, joined
    /// addresses, and joined phones are the same office.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.city,
            self.addresses.join(";"),
            self.phones.join(";")
        )
    }
}

/// Canonical per-profile result. Immutable after creation except for
/// `error`, which is set when the profile exhausted its retry budget.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorRecord {
    /// Canonical profile URL this record was scraped from.
    pub url: String,
    pub name: String,
    pub specialty: String,
    /// Short alphanumeric medical-council license identifier.
    pub code: String,
    pub city: String,
    /// Union of addresses across all offices plus page-level fallbacks,
    /// deduplicated, in extraction order.
    pub addresses: Vec<String>,
    /// Union of phones across all offices plus page-level fallbacks,
    /// deduplicated by digit key, in extraction order.
    pub phones: Vec<String>,
    pub offices: Vec<Office>,
    /// Set only when every attempt for this URL failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl DoctorRecord {
    /// Placeholder emitted after retry exhaustion so every queued URL
    /// yields exactly one result row.
    #[must_use]
    pub fn failed(url: &str, error: &str) -> Self {
        Self {
            url: url.to_owned(),
            error: Some(error.to_owned()),
            ..Self::default()
        }
    }
}
