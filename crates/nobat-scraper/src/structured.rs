//! Embedded structured metadata (`<script type="application/ld+json">`).
//!
//! Profile pages embed schema.org entries whose shape varies per source:
//! a `Physician`/`Person` object, bare `PostalAddress` objects, identifier
//! objects with `{name, value}` pairs, or arrays and `@graph` containers
//! of any of these. Instead of speculative property probing, each parsed
//! value is classified into a tagged union and nested unknown values are
//! flattened recursively into string candidate lists.

use regex::Regex;
use std::sync::OnceLock;

use serde_json::Value;

/// One structured entry, classified by shape.
#[derive(Debug, Clone)]
pub enum StructuredEntry {
    Person(PersonEntry),
    Address(AddressEntry),
    Identifier(IdentifierEntry),
    Unknown(Value),
}

/// A person-like entry (`Person`, `Physician`, medical-business types):
/// the first-class source for name, specialty, license code, and contact
/// data.
#[derive(Debug, Clone, Default)]
pub struct PersonEntry {
    pub name: Option<String>,
    pub specialties: Vec<String>,
    /// Identifier candidates in source order, nested values already
    /// flattened: `identifier` first, `medicalLicenseNumber` after.
    pub identifier_candidates: Vec<String>,
    /// Nested address objects.
    pub addresses: Vec<AddressEntry>,
    /// Address fields found directly on the entry itself rather than in a
    /// nested address object. Whether these seed the office list is a
    /// config decision (`ScrapeConfig::flat_entry_seeds_office`).
    pub flat_address: Option<AddressEntry>,
    /// `telephone` plus `contactPoint` telephones, flattened.
    pub telephones: Vec<String>,
}

/// A postal-address-like entry or sub-object.
#[derive(Debug, Clone, Default)]
pub struct AddressEntry {
    pub streets: Vec<String>,
    pub city: Option<String>,
    pub telephones: Vec<String>,
}

/// An identifier object (`{name: "Medical Council", value: "م 67890"}`).
#[derive(Debug, Clone, Default)]
pub struct IdentifierEntry {
    pub name: Option<String>,
    pub value_candidates: Vec<String>,
}

const PERSON_TYPES: &[&str] = &[
    "Person",
    "Physician",
    "MedicalBusiness",
    "MedicalClinic",
    "MedicalOrganization",
    "Dentist",
    "LocalBusiness",
];

fn ldjson_script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
            .expect("valid regex")
    })
}

/// Parses every JSON-LD script block in `html` into classified entries.
/// Blocks that fail to parse are skipped; top-level arrays and `@graph`
/// containers are expanded.
#[must_use]
pub fn parse_structured_entries(html: &str) -> Vec<StructuredEntry> {
    let mut entries = Vec::new();

    for cap in ldjson_script_re().captures_iter(html) {
        let json_text = match cap.get(1) {
            Some(m) => m.as_str(),
            None => continue,
        };
        let value: Value = match serde_json::from_str(json_text) {
            Ok(v) => v,
            Err(_) => continue,
        };

        let mut items: Vec<Value> = match value {
            Value::Array(array) => array,
            other => vec![other],
        };

        // Expand @graph containers: some pages wrap everything in
        // {"@graph": [...]} at the top level.
        let mut expanded = Vec::new();
        for item in &items {
            if let Some(graph) = item.get("@graph").and_then(Value::as_array) {
                expanded.extend(graph.iter().cloned());
            }
        }
        items.extend(expanded);

        for item in items {
            entries.push(classify(&item));
        }
    }

    entries
}

/// Classifies one parsed JSON value into the tagged union.
#[must_use]
pub fn classify(item: &Value) -> StructuredEntry {
    let Some(obj) = item.as_object() else {
        return StructuredEntry::Unknown(item.clone());
    };

    if type_matches(item, &["PostalAddress"]) {
        return StructuredEntry::Address(parse_address(item));
    }
    if type_matches(item, PERSON_TYPES) || looks_person_like(obj) {
        return StructuredEntry::Person(parse_person(item));
    }
    if obj.contains_key("value") {
        return StructuredEntry::Identifier(IdentifierEntry {
            name: obj.get("name").and_then(Value::as_str).map(str::to_owned),
            value_candidates: flatten_candidates(&obj["value"]),
        });
    }

    StructuredEntry::Unknown(item.clone())
}

/// `@type` may be a plain string or an array of strings; accept the item
/// when any element matches.
fn type_matches(item: &Value, accepted: &[&str]) -> bool {
    let Some(type_node) = item.get("@type") else {
        return false;
    };
    if let Some(s) = type_node.as_str() {
        return accepted.iter().any(|t| s.eq_ignore_ascii_case(t));
    }
    if let Some(arr) = type_node.as_array() {
        return arr
            .iter()
            .filter_map(Value::as_str)
            .any(|s| accepted.iter().any(|t| s.eq_ignore_ascii_case(t)));
    }
    false
}

/// Untyped objects that still carry person-shaped keys are treated as
/// person entries rather than discarded.
fn looks_person_like(obj: &serde_json::Map<String, Value>) -> bool {
    ["medicalSpecialty", "identifier", "medicalLicenseNumber"]
        .iter()
        .any(|key| obj.contains_key(*key))
        || (obj.contains_key("name")
            && (obj.contains_key("address") || obj.contains_key("telephone")))
}

fn parse_person(item: &Value) -> PersonEntry {
    let mut person = PersonEntry {
        name: item.get("name").and_then(Value::as_str).map(str::to_owned),
        ..PersonEntry::default()
    };

    for key in ["medicalSpecialty", "specialty", "department"] {
        if let Some(value) = item.get(key) {
            person.specialties.extend(flatten_candidates(value));
        }
    }

    for key in ["identifier", "medicalLicenseNumber"] {
        if let Some(value) = item.get(key) {
            person.identifier_candidates.extend(flatten_candidates(value));
        }
    }

    match item.get("address") {
        Some(Value::Array(array)) => {
            person.addresses.extend(array.iter().map(parse_address));
        }
        Some(addr @ Value::Object(_)) => person.addresses.push(parse_address(addr)),
        Some(Value::String(s)) => person.addresses.push(AddressEntry {
            streets: vec![s.clone()],
            ..AddressEntry::default()
        }),
        _ => {}
    }

    if let Some(value) = item.get("telephone") {
        person.telephones.extend(flatten_candidates(value));
    }
    match item.get("contactPoint") {
        Some(Value::Array(array)) => {
            for point in array {
                if let Some(value) = point.get("telephone") {
                    person.telephones.extend(flatten_candidates(value));
                }
            }
        }
        Some(point @ Value::Object(_)) => {
            if let Some(value) = point.get("telephone") {
                person.telephones.extend(flatten_candidates(value));
            }
        }
        _ => {}
    }

    // Address fields directly on the entry, outside any address object.
    let flat = parse_flat_address(item);
    if !flat.streets.is_empty() || flat.city.is_some() {
        person.flat_address = Some(flat);
    }

    person
}

fn parse_address(item: &Value) -> AddressEntry {
    let streets = match item.get("streetAddress") {
        Some(value) => flatten_candidates(value),
        None => Vec::new(),
    };
    let city = item
        .get("addressLocality")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let telephones = match item.get("telephone") {
        Some(value) => flatten_candidates(value),
        None => Vec::new(),
    };
    AddressEntry {
        streets,
        city,
        telephones,
    }
}

fn parse_flat_address(item: &Value) -> AddressEntry {
    let streets = item
        .get("streetAddress")
        .map(flatten_candidates)
        .unwrap_or_default();
    let city = item
        .get("addressLocality")
        .and_then(Value::as_str)
        .map(str::to_owned);
    AddressEntry {
        streets,
        city,
        telephones: Vec::new(),
    }
}

/// Flattens an arbitrarily nested JSON value into a list of string
/// candidates: strings pass through, numbers are stringified, arrays
/// concatenate element-wise, and objects contribute their values
/// recursively. Booleans and nulls contribute nothing.
#[must_use]
pub fn flatten_candidates(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    flatten_into(value, &mut out);
    out
}

fn flatten_into(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if !s.is_empty() {
                out.push(s.clone());
            }
        }
        Value::Number(n) => out.push(n.to_string()),
        Value::Array(array) => {
            for item in array {
                flatten_into(item, out);
            }
        }
        Value::Object(obj) => {
            // Skip JSON-LD bookkeeping keys; everything else may hide a
            // candidate value.
            for (key, nested) in obj {
                if key.starts_with('@') {
                    continue;
                }
                flatten_into(nested, out);
            }
        }
        Value::Bool(_) | Value::Null => {}
    }
}
