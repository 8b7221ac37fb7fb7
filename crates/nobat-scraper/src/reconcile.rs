//! Field reconciliation: merging raw candidate values for one field into a
//! deduplicated canonical value or list.
//!
//! Every reconciler is total — absent or garbage input yields empty
//! containers, never an error. Dedup is key-based: free text keys on the
//! normalized text itself, phones key on their digit skeleton so that
//! formatting variants of one number collapse to a single entry.

use std::collections::HashSet;

use regex::Regex;
use std::sync::OnceLock;

use nobat_core::Office;

use crate::normalize::normalize_text;

/// Label prefixes stripped from stored phone values. Matched
/// case-insensitively against the normalized text, each optionally
/// followed by `:`.
const PHONE_PREFIXES: &[&str] = &["tel:", "tel", "phone:", "phone", "شماره تماس", "تلفن", "شماره"];

/// Reconcile free-text candidates (addresses, cities, names): normalize,
/// drop empties, dedup by the normalized text, preserve first-seen order.
pub fn reconcile_texts<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in candidates {
        let text = normalize_text(raw.as_ref());
        if text.is_empty() {
            continue;
        }
        if seen.insert(text.clone()) {
            out.push(text);
        }
    }
    out
}

/// Reconcile phone candidates: normalize, strip label prefixes, drop
/// values with no digits, dedup by [`phone_key`] keeping the first-seen
/// human-readable formatting.
pub fn reconcile_phones<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in candidates {
        let phone = clean_phone(raw.as_ref());
        let key = phone_key(&phone);
        if key.chars().all(|c| !c.is_ascii_digit()) {
            continue;
        }
        if seen.insert(key) {
            out.push(phone);
        }
    }
    out
}

/// Normalizes a raw phone string and strips known label prefixes while
/// keeping the human-readable formatting of the number itself.
#[must_use]
pub fn clean_phone(raw: &str) -> String {
    let mut text = normalize_text(raw);
    for prefix in PHONE_PREFIXES {
        // Persian prefixes have no case; ASCII ones are matched
        // case-insensitively. `get` keeps us on a char boundary.
        let matches = text
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            text = text[prefix.len()..].to_owned();
            break;
        }
    }
    text.trim_start_matches([':', ' ']).trim().to_owned()
}

/// Dedup key for a phone: everything except digits and `+` is dropped,
/// then the Iranian country prefix (`+98` or `0098`) is folded into the
/// domestic leading `0`, so `021-12345678` and `+98 21 12345678` compare
/// equal on their digit skeleton.
#[must_use]
pub fn phone_key(phone: &str) -> String {
    let skeleton: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if let Some(rest) = skeleton.strip_prefix("+98") {
        return format!("0{rest}");
    }
    if let Some(rest) = skeleton.strip_prefix("0098") {
        return format!("0{rest}");
    }
    skeleton
}

fn code_shape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Optional standalone council letter (Persian/Arabic script only),
        // optional whitespace, digits, optional single trailing letter.
        // Both ends are gated on a non-alphanumeric boundary so the shape
        // never tears digits out of a mixed Latin token like "AB123" —
        // those fall through to the token scan.
        Regex::new(r"(?:^|[^\p{L}\d])(\p{Arabic}\s*)?(\d+)(\p{Arabic})?(?:$|[^\p{L}\d])")
            .expect("valid regex")
    })
}

/// Extracts a license-code token from free text.
///
/// First tries a single match of the shape *(optional single letter,
/// optional whitespace) + digits + (optional trailing letter)* and returns
/// it with internal whitespace stripped, preserving a council-letter affix
/// attached to the numeric id. When no such token exists, splits the text
/// on runs of non-alphanumeric characters and scans tokens in order:
/// the first token containing both a letter and a digit wins immediately;
/// otherwise the first purely-numeric token is returned as a fallback.
#[must_use]
pub fn extract_code_token(raw: &str) -> Option<String> {
    let text = normalize_text(raw);
    if text.is_empty() {
        return None;
    }

    if let Some(cap) = code_shape_re().captures(&text) {
        let mut token = String::new();
        if let Some(prefix) = cap.get(1) {
            token.extend(prefix.as_str().chars().filter(|c| !c.is_whitespace()));
        }
        token.push_str(&cap[2]);
        if let Some(suffix) = cap.get(3) {
            token.push_str(suffix.as_str());
        }
        return Some(token);
    }

    let mut numeric_fallback: Option<&str> = None;
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        let has_letter = token.chars().any(char::is_alphabetic);
        let has_digit = token.chars().any(|c| c.is_ascii_digit());
        if has_letter && has_digit {
            return Some(token.to_owned());
        }
        if has_digit && numeric_fallback.is_none() {
            numeric_fallback = Some(token);
        }
    }
    numeric_fallback.map(str::to_owned)
}

/// Tries [`extract_code_token`] on each candidate in source order and
/// returns the first hit. Source order is load-bearing: the on-page
/// primary element comes before broader fallbacks and structured
/// identifier values.
pub fn extract_code_from_candidates<I, S>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .find_map(|c| extract_code_token(c.as_ref()))
}

/// Accumulates office candidates, normalizing each, discarding all-empty
/// ones, and deduplicating by the composite `(city, addresses, phones)`
/// key while preserving insertion order.
#[derive(Debug, Default)]
pub struct OfficeCollector {
    seen: HashSet<String>,
    offices: Vec<Office>,
}

impl OfficeCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes and stores one candidate office. Returns whether the
    /// office was kept (non-empty and not a duplicate).
    pub fn push(&mut self, candidate: Office) -> bool {
        let office = Office {
            city: normalize_text(&candidate.city),
            addresses: reconcile_texts(&candidate.addresses),
            phones: reconcile_phones(&candidate.phones),
        };
        if office.is_empty() {
            return false;
        }
        let key = office.dedup_key();
        if !self.seen.insert(key) {
            return false;
        }
        self.offices.push(office);
        true
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offices.is_empty()
    }

    #[must_use]
    pub fn into_offices(self) -> Vec<Office> {
        self.offices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // reconcile_texts / reconcile_phones
    // -----------------------------------------------------------------------

    #[test]
    fn texts_dedup_on_normalized_form() {
        let merged = reconcile_texts(["  تهران ", "تهران", "", "مشهد"]);
        assert_eq!(merged, vec!["تهران", "مشهد"]);
    }

    #[test]
    fn phone_formatting_variants_collapse_to_first_seen() {
        let merged = reconcile_phones(["021-12345678", "021 1234 5678", "٠٢١١٢٣٤٥٦٧٨"]);
        assert_eq!(merged, vec!["021-12345678"]);
    }

    #[test]
    fn country_code_variant_collapses_onto_domestic_form() {
        let merged = reconcile_phones(["021-12345678", "+98 21 12345678"]);
        assert_eq!(merged, vec!["021-12345678"]);
    }

    #[test]
    fn phones_with_distinct_digit_keys_are_kept() {
        let merged = reconcile_phones(["021-12345678", "021-12345679"]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn phone_label_prefixes_are_stripped() {
        assert_eq!(clean_phone("tel:02112345678"), "02112345678");
        assert_eq!(clean_phone("تلفن: ۰۲۱۱۲۳۴۵۶۷۸"), "02112345678");
        assert_eq!(clean_phone("شماره تماس : 021-123"), "021-123");
    }

    #[test]
    fn digitless_phone_candidates_are_dropped() {
        let merged = reconcile_phones(["تلفن:", "تماس بگیرید", "+"]);
        assert!(merged.is_empty());
    }

    // -----------------------------------------------------------------------
    // extract_code_token
    // -----------------------------------------------------------------------

    #[test]
    fn letter_prefix_attached_to_digits_is_preserved() {
        assert_eq!(
            extract_code_token("کد نظام پزشکی: ف ۱۲۳۴۵").as_deref(),
            Some("ف12345")
        );
    }

    #[test]
    fn trailing_letter_is_kept() {
        assert_eq!(extract_code_token("code 4521م").as_deref(), Some("4521م"));
    }

    #[test]
    fn bare_digits_match_the_shape() {
        assert_eq!(extract_code_token("نظام پزشکی 67890").as_deref(), Some("67890"));
    }

    #[test]
    fn attached_persian_letter_prefix_is_kept() {
        assert_eq!(extract_code_token("ش12345").as_deref(), Some("ش12345"));
    }

    #[test]
    fn standalone_number_beats_embedded_latin_token() {
        // "456" fits the code shape, so the regex wins before the token
        // scan ever sees "AB123".
        assert_eq!(extract_code_token("456 AB123").as_deref(), Some("456"));
    }

    #[test]
    fn token_scan_returns_first_mixed_latin_token() {
        // No standalone digit run anywhere: the shape regex fails and the
        // token scan picks the first letter+digit token in order.
        assert_eq!(extract_code_token("AB123 CD45").as_deref(), Some("AB123"));
        assert_eq!(extract_code_token("ref AB123").as_deref(), Some("AB123"));
    }

    #[test]
    fn pure_numeric_fallback_when_no_alphanumeric_token() {
        assert_eq!(extract_code_token("(۹۸۷)").as_deref(), Some("987"));
    }

    #[test]
    fn empty_and_letter_only_inputs_yield_none() {
        assert_eq!(extract_code_token(""), None);
        assert_eq!(extract_code_token("نظام پزشکی"), None);
    }

    #[test]
    fn first_candidate_in_source_order_wins() {
        let code = extract_code_from_candidates(["ف123", "غ987", "ک456"]);
        assert_eq!(code.as_deref(), Some("ف123"));
    }

    #[test]
    fn later_candidates_cover_empty_leading_ones() {
        let code = extract_code_from_candidates(["", "بدون کد", "م 67890"]);
        assert_eq!(code.as_deref(), Some("م67890"));
    }

    // -----------------------------------------------------------------------
    // OfficeCollector
    // -----------------------------------------------------------------------

    #[test]
    fn all_empty_office_is_discarded() {
        let mut collector = OfficeCollector::new();
        let kept = collector.push(Office {
            city: "  ".to_owned(),
            addresses: vec![String::new()],
            phones: vec!["تلفن:".to_owned()],
        });
        assert!(!kept);
        assert!(collector.into_offices().is_empty());
    }

    #[test]
    fn identical_offices_collapse_after_normalization() {
        let mut collector = OfficeCollector::new();
        collector.push(Office {
            city: "تهران".to_owned(),
            addresses: vec!["خیابان ولیعصر، پلاک ۱۲".to_owned()],
            phones: vec!["۰۲۱۱۲۳۴۵۶۷۸".to_owned()],
        });
        collector.push(Office {
            city: " تهران ".to_owned(),
            addresses: vec!["خیابان  ولیعصر، پلاک 12".to_owned()],
            phones: vec!["tel:02112345678".to_owned()],
        });
        let offices = collector.into_offices();
        assert_eq!(offices.len(), 1);
        assert_eq!(offices[0].addresses, vec!["خیابان ولیعصر، پلاک 12"]);
    }

    #[test]
    fn distinct_offices_keep_insertion_order() {
        let mut collector = OfficeCollector::new();
        collector.push(Office {
            city: "تهران".to_owned(),
            ..Office::default()
        });
        collector.push(Office {
            city: "مشهد".to_owned(),
            ..Office::default()
        });
        let offices = collector.into_offices();
        assert_eq!(offices[0].city, "تهران");
        assert_eq!(offices[1].city, "مشهد");
    }
}
