//! Profile-page extraction.
//!
//! Each field runs an explicit ordered fallback chain: structured entries
//! (already parsed into the [`crate::structured`] union) are first-class,
//! known DOM locations come next, and attribute scans close the chain.
//! The interactive part — waiting for the page to settle and revealing
//! hidden phone numbers — talks to the in-page agent through the session;
//! everything after the snapshot is a pure function over the HTML.

use std::time::Duration;

use regex::Regex;

use nobat_core::{AppConfig, DoctorRecord, Office};

use crate::browser::{AgentRequest, AgentResponse, Browser};
use crate::dom;
use crate::error::ScrapeError;
use crate::normalize::normalize_text;
use crate::reconcile::{
    extract_code_from_candidates, reconcile_phones, reconcile_texts, OfficeCollector,
};
use crate::session::SessionManager;
use crate::site;
use crate::structured::{
    parse_structured_entries, AddressEntry, IdentifierEntry, PersonEntry, StructuredEntry,
};
use crate::wait::ChangeWait;

/// Settle delay after the reveal-phone pass, letting the page re-render
/// the numbers it was hiding.
const REVEAL_SETTLE_MS: u64 = 300;

/// Visits the current session's page state for `url`: waits (bounded) for
/// a name-bearing element, best-effort reveals hidden phone numbers,
/// snapshots the DOM, and extracts the canonical record.
///
/// # Errors
///
/// Returns [`ScrapeError`] when navigation, agent messaging, or the
/// snapshot fails. A name-wait timeout is not an error — extraction
/// proceeds with whatever is present.
pub async fn collect_profile<B: Browser>(
    session: &mut SessionManager<'_, B>,
    url: &str,
    app: &AppConfig,
    flat_entry_seeds_office: bool,
) -> Result<DoctorRecord, ScrapeError> {
    session.ensure(url).await?;

    if let Some(changes) = session.dom_changes() {
        let mut wait = ChangeWait::new(changes, Duration::from_secs(app.name_wait_secs));
        loop {
            match session.message(AgentRequest::HasName).await? {
                AgentResponse::Present { present: true } => break,
                AgentResponse::Present { present: false } => {}
                _ => {
                    return Err(ScrapeError::UnexpectedAgentResponse {
                        request: "has_name",
                    })
                }
            }
            if !wait.tick().await {
                tracing::debug!(url, "name element did not appear in time; extracting anyway");
                break;
            }
        }
    }

    // Best-effort: a page without reveal controls is the common case and
    // never fails the extraction.
    match session.message(AgentRequest::RevealHiddenPhones).await {
        Ok(AgentResponse::Revealed { revealed }) if revealed > 0 => {
            tracing::debug!(url, revealed, "revealed hidden phone numbers");
            tokio::time::sleep(Duration::from_millis(REVEAL_SETTLE_MS)).await;
        }
        Ok(_) => {}
        Err(err) => {
            tracing::debug!(url, error = %err, "reveal-phone pass failed; continuing");
        }
    }

    let html = match session.message(AgentRequest::Snapshot).await? {
        AgentResponse::Html { html } => html,
        _ => {
            return Err(ScrapeError::UnexpectedAgentResponse {
                request: "snapshot",
            })
        }
    };

    Ok(extract_record(&html, url, flat_entry_seeds_office))
}

/// Extracts and reconciles one profile's record from a DOM snapshot.
/// Total: missing data yields empty fields, never an error.
#[must_use]
pub fn extract_record(html: &str, url: &str, flat_entry_seeds_office: bool) -> DoctorRecord {
    let entries = parse_structured_entries(html);
    let mut persons: Vec<&PersonEntry> = Vec::new();
    let mut bare_addresses: Vec<&AddressEntry> = Vec::new();
    let mut identifiers: Vec<&IdentifierEntry> = Vec::new();
    for entry in &entries {
        match entry {
            StructuredEntry::Person(p) => persons.push(p),
            StructuredEntry::Address(a) => bare_addresses.push(a),
            StructuredEntry::Identifier(i) => identifiers.push(i),
            StructuredEntry::Unknown(_) => {}
        }
    }

    // Name: heading, then the name attribute, then structured entries.
    let name_strategies: [&dyn Fn() -> Option<String>; 3] = [
        &|| first_heading(html),
        &|| dom::attr_values(html, site::NAME_ATTR).into_iter().next(),
        &|| persons.iter().find_map(|p| p.name.clone()),
    ];
    let name = first_non_empty(&name_strategies);

    // Specialty: on-page selectors in priority order, then the structured
    // specialty list joined with the Persian comma.
    let specialty_strategies: [&dyn Fn() -> Option<String>; 2] = [
        &|| {
            site::SPECIALTY_CLASS_KEYWORDS.iter().find_map(|kw| {
                leaf_class_text(html, kw)
                    .into_iter()
                    .find(|t| !normalize_text(t).is_empty())
            })
        },
        &|| {
            let merged = reconcile_texts(persons.iter().flat_map(|p| p.specialties.iter()));
            if merged.is_empty() {
                None
            } else {
                Some(merged.join(site::SPECIALTY_JOIN))
            }
        },
    ];
    let specialty = first_non_empty(&specialty_strategies);

    // License code: candidate order is load-bearing — primary on-page
    // element, broader fallback element, the data attribute, then
    // structured identifier values.
    let mut code_candidates: Vec<String> = Vec::new();
    for kw in site::CODE_CLASS_KEYWORDS {
        code_candidates.extend(leaf_class_text(html, kw));
    }
    code_candidates.extend(dom::attr_values(html, site::CODE_ATTR));
    for person in &persons {
        code_candidates.extend(person.identifier_candidates.iter().cloned());
    }
    for identifier in &identifiers {
        code_candidates.extend(identifier.value_candidates.iter().cloned());
    }
    let code = extract_code_from_candidates(&code_candidates).unwrap_or_default();

    // Offices: DOM containers and structured address entries, deduplicated
    // by the composite key.
    let mut collector = OfficeCollector::new();
    for block in dom::class_blocks(html, "div", site::OFFICE_CLASS_KEYWORD) {
        collector.push(office_from_block(block));
    }
    for person in &persons {
        for address in &person.addresses {
            collector.push(office_from_entry(address));
        }
    }
    for address in &bare_addresses {
        collector.push(office_from_entry(address));
    }

    let mut flat_cities: Vec<String> = Vec::new();
    let mut flat_streets: Vec<String> = Vec::new();
    for person in &persons {
        if let Some(flat) = &person.flat_address {
            if flat_entry_seeds_office {
                collector.push(office_from_entry(flat));
            }
            flat_cities.extend(flat.city.iter().cloned());
            flat_streets.extend(flat.streets.iter().cloned());
        }
    }

    // Page-wide generic address pass only when neither source found an
    // office.
    let fallback_addresses: Vec<String> = if collector.is_empty() {
        site::ADDRESS_CLASS_KEYWORDS
            .iter()
            .flat_map(|kw| leaf_class_text(html, kw))
            .collect()
    } else {
        Vec::new()
    };

    let offices = collector.into_offices();

    // Top-level unions across offices plus page-level values.
    let mut city_candidates: Vec<String> = offices.iter().map(|o| o.city.clone()).collect();
    city_candidates.extend(flat_cities);
    city_candidates.extend(leaf_class_text(html, site::CITY_CLASS_KEYWORD));
    let city = reconcile_texts(&city_candidates).join(site::SPECIALTY_JOIN);

    let mut address_candidates: Vec<String> =
        offices.iter().flat_map(|o| o.addresses.clone()).collect();
    address_candidates.extend(flat_streets);
    address_candidates.extend(fallback_addresses);
    let addresses = reconcile_texts(&address_candidates);

    let mut phone_candidates = phone_candidates_in(html);
    for person in &persons {
        phone_candidates.extend(person.telephones.iter().cloned());
        for address in &person.addresses {
            phone_candidates.extend(address.telephones.iter().cloned());
        }
    }
    for address in &bare_addresses {
        phone_candidates.extend(address.telephones.iter().cloned());
    }
    for office in &offices {
        phone_candidates.extend(office.phones.iter().cloned());
    }
    let phones = reconcile_phones(&phone_candidates);

    DoctorRecord {
        url: url.to_owned(),
        name,
        specialty,
        code,
        city,
        addresses,
        phones,
        offices,
        error: None,
    }
}

/// Runs an ordered strategy list: the first strategy whose normalized
/// result is non-empty wins.
fn first_non_empty(strategies: &[&dyn Fn() -> Option<String>]) -> String {
    strategies
        .iter()
        .find_map(|strategy| {
            strategy()
                .map(|raw| normalize_text(&raw))
                .filter(|text| !text.is_empty())
        })
        .unwrap_or_default()
}

fn first_heading(html: &str) -> Option<String> {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid regex"));
    dom::first_capture(html, re).map(|inner| dom::strip_tags(&inner))
}

/// Immediate text of every element whose class list contains `class_kw`,
/// in document order.
fn leaf_class_text(html: &str, class_kw: &str) -> Vec<String> {
    let re = Regex::new(&format!(
        r#"(?i)<[a-z][a-z0-9]*\b[^>]*class\s*=\s*["'][^"']*{}[^"']*["'][^>]*>([^<]*)"#,
        regex::escape(class_kw)
    ))
    .expect("valid regex");
    dom::all_captures(html, &re)
}

fn office_from_block(block: &str) -> Office {
    let city = leaf_class_text(block, site::CITY_CLASS_KEYWORD)
        .into_iter()
        .next()
        .unwrap_or_default();
    let mut addresses = Vec::new();
    for kw in site::ADDRESS_CLASS_KEYWORDS {
        addresses.extend(leaf_class_text(block, kw));
    }
    Office {
        city,
        addresses,
        phones: phone_candidates_in(block),
    }
}

fn office_from_entry(address: &AddressEntry) -> Office {
    Office {
        city: address.city.clone().unwrap_or_default(),
        addresses: address.streets.clone(),
        phones: address.telephones.clone(),
    }
}

/// Raw phone candidates from a fragment of markup: phone-container text
/// (split on the common separators), `tel:` link targets and their
/// visible text, then phone data attributes.
fn phone_candidates_in(html: &str) -> Vec<String> {
    let mut out = Vec::new();
    for kw in site::PHONE_CLASS_KEYWORDS {
        for text in leaf_class_text(html, kw) {
            out.extend(split_phones(&text));
        }
    }
    for (href, text) in dom::anchors(html) {
        if href.trim().to_ascii_lowercase().starts_with("tel:") {
            out.push(href);
            out.extend(split_phones(&text));
        }
    }
    for attr in site::PHONE_ATTRS {
        out.extend(dom::attr_values(html, attr));
    }
    out
}

fn split_phones(text: &str) -> Vec<String> {
    text.split(site::PHONE_SEPARATORS)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
