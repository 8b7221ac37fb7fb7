//! Markup conventions of the target site.
//!
//! The crawl is specific to one doctor directory; everything that encodes
//! its markup vocabulary — profile URL shape, class keywords, data
//! attributes — lives here so the extractor and discoverer stay free of
//! string literals.

/// Path marker of a profile page.
pub const PROFILE_PATH_MARKER: &str = "/dr/";

/// Data attributes that expose profile URLs on listing cards.
pub const PROFILE_URL_ATTRS: &[&str] = &["data-profile-url", "data-doctor-url"];

/// Data attribute carrying the doctor's display name.
pub const NAME_ATTR: &str = "data-doctor-name";

/// Class keywords of specialty-bearing elements, in priority order.
pub const SPECIALTY_CLASS_KEYWORDS: &[&str] = &["specialty", "expertise"];

/// Class keywords of license-code elements: the primary on-page element
/// first, then the broader fallback.
pub const CODE_CLASS_KEYWORDS: &[&str] = &["medical-code", "nezam"];

/// Data attribute carrying the license code.
pub const CODE_ATTR: &str = "data-medical-code";

/// Class keyword of per-location office containers.
pub const OFFICE_CLASS_KEYWORD: &str = "office";

/// Class keywords of address-bearing elements inside an office block or,
/// for the page-wide fallback pass, anywhere on the page.
pub const ADDRESS_CLASS_KEYWORDS: &[&str] = &["address", "addr"];

/// Class keyword of city elements inside an office block.
pub const CITY_CLASS_KEYWORD: &str = "city";

/// Class keywords of phone-container elements.
pub const PHONE_CLASS_KEYWORDS: &[&str] = &["phone", "tel-number"];

/// Data attributes that expose phone numbers.
pub const PHONE_ATTRS: &[&str] = &["data-phone", "data-tel"];

/// Separators splitting multiple phone numbers inside one container.
pub const PHONE_SEPARATORS: &[char] = &[',', '،', '/', '|', '\n'];

/// Separator used when joining a structured specialty list.
pub const SPECIALTY_JOIN: &str = "، ";

/// Export filename prefixes.
pub const EXPORT_PREFIX: &str = "nobat-doctors";
pub const EXPORT_PREFIX_PARTIAL: &str = "nobat-doctors-partial";

/// Whether `url` is a profile page on any host.
#[must_use]
pub fn is_profile_url(url: &str) -> bool {
    url.contains(PROFILE_PATH_MARKER)
}

/// Whether `url` is a listing page on `host`: on the target host and not
/// itself a profile page.
#[must_use]
pub fn is_listing_url(url: &str, host: &str) -> bool {
    crate::urls::is_on_target_host(url, host) && !is_profile_url(url)
}
