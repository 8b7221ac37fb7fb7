use super::*;

const PROFILE_URL: &str = "https://nobat.ir/dr/maryam-ahmadi";

const FULL_PROFILE: &str = r#"
<html><head>
<script type="application/ld+json">
{
    "@type": "Physician",
    "name": "دکتر مریم احمدی",
    "medicalSpecialty": ["قلب و عروق", "اکوکاردیوگرافی"],
    "identifier": {"name": "نظام پزشکی", "value": "م ۶۷۸۹۰"},
    "address": {
        "@type": "PostalAddress",
        "streetAddress": "بلوار سجاد، ساختمان پزشکان",
        "addressLocality": "مشهد",
        "telephone": "۰۵۱۳۷۶۵۴۳۲۱"
    },
    "telephone": "+98 21 11111111"
}
</script>
</head><body>
<h1 class="profile-title">دکتر  مریم   احمدی</h1>
<span class="specialty">قلب و عروق</span>
<span class="medical-code">کد نظام پزشکی: ۱۲۳۴۵</span>
<div class="office-card office">
    <span class="city">تهران</span>
    <div class="address">خیابان ولیعصر، پلاک ۱۲</div>
    <span class="phone">۰۲۱-۱۲۳۴۵۶۷۸، ۰۲۱-۸۷۶۵۴۳۲۱</span>
</div>
<a href="tel:02112345678">۰۲۱ ۱۲۳۴ ۵۶۷۸</a>
</body></html>
"#;

// ---------------------------------------------------------------------------
// extract_record: field strategies
// ---------------------------------------------------------------------------

#[test]
fn full_profile_extracts_every_field() {
    let record = extract_record(FULL_PROFILE, PROFILE_URL, false);

    assert_eq!(record.url, PROFILE_URL);
    assert_eq!(record.name, "دکتر مریم احمدی");
    assert_eq!(record.specialty, "قلب و عروق");
    assert_eq!(record.code, "12345");
    assert!(record.error.is_none());

    // One office from the DOM block, one from the structured address.
    assert_eq!(record.offices.len(), 2);
    assert_eq!(record.offices[0].city, "تهران");
    assert_eq!(record.offices[1].city, "مشهد");

    assert_eq!(record.city, "تهران، مشهد");
    assert_eq!(
        record.addresses,
        vec!["خیابان ولیعصر، پلاک 12", "بلوار سجاد، ساختمان پزشکان"]
    );

    // The tel: anchor duplicates the first office phone and collapses.
    assert_eq!(
        record.phones,
        vec!["021-12345678", "021-87654321", "+98 21 11111111", "05137654321"]
    );
}

#[test]
fn missing_everything_yields_empty_record() {
    let record = extract_record("<html><body></body></html>", PROFILE_URL, false);
    assert_eq!(record.url, PROFILE_URL);
    assert!(record.name.is_empty());
    assert!(record.specialty.is_empty());
    assert!(record.code.is_empty());
    assert!(record.city.is_empty());
    assert!(record.addresses.is_empty());
    assert!(record.phones.is_empty());
    assert!(record.offices.is_empty());
    assert!(record.error.is_none());
}

#[test]
fn name_falls_back_to_data_attribute() {
    let html = r#"<div class="card" data-doctor-name="دکتر علی رضایی"></div>"#;
    let record = extract_record(html, PROFILE_URL, false);
    assert_eq!(record.name, "دکتر علی رضایی");
}

#[test]
fn name_falls_back_to_structured_entry() {
    let html = r#"
        <script type="application/ld+json">
        {"@type": "Person", "name": "دکتر سارا کریمی", "telephone": "021"}
        </script>
    "#;
    let record = extract_record(html, PROFILE_URL, false);
    assert_eq!(record.name, "دکتر سارا کریمی");
}

#[test]
fn empty_heading_does_not_shadow_later_strategies() {
    let html = r#"<h1>   </h1><div data-doctor-name="دکتر رضا"></div>"#;
    let record = extract_record(html, PROFILE_URL, false);
    assert_eq!(record.name, "دکتر رضا");
}

#[test]
fn structured_specialties_join_with_persian_comma() {
    let html = r#"
        <script type="application/ld+json">
        {"@type": "Physician", "name": "x", "medicalSpecialty": ["قلب", "داخلی", "قلب"]}
        </script>
    "#;
    let record = extract_record(html, PROFILE_URL, false);
    assert_eq!(record.specialty, "قلب، داخلی");
}

#[test]
fn on_page_code_beats_attribute_and_structured_values() {
    let html = r#"
        <script type="application/ld+json">
        {"@type": "Physician", "name": "x", "medicalLicenseNumber": "88888"}
        </script>
        <span class="medical-code">کد: ۱۲۳۴۵</span>
        <div data-medical-code="99999"></div>
    "#;
    let record = extract_record(html, PROFILE_URL, false);
    assert_eq!(record.code, "12345");
}

#[test]
fn structured_identifier_supplies_code_when_page_has_none() {
    let html = r#"
        <script type="application/ld+json">
        {"@type": "Physician", "name": "x",
         "identifier": {"name": "نظام پزشکی", "value": "م ۶۷۸۹۰"}}
        </script>
    "#;
    let record = extract_record(html, PROFILE_URL, false);
    assert_eq!(record.code, "م67890");
}

// ---------------------------------------------------------------------------
// extract_record: offices and fallbacks
// ---------------------------------------------------------------------------

#[test]
fn dom_and_structured_office_variants_of_one_location_collapse() {
    let html = r#"
        <script type="application/ld+json">
        {"@type": "Physician", "name": "x",
         "address": {"@type": "PostalAddress",
                     "streetAddress": "خیابان ولیعصر، پلاک ۱۲",
                     "addressLocality": "تهران",
                     "telephone": "02112345678"}}
        </script>
        <div class="office">
            <span class="city">تهران</span>
            <div class="address">خیابان ولیعصر، پلاک 12</div>
            <span class="phone">۰۲۱۱۲۳۴۵۶۷۸</span>
        </div>
    "#;
    let record = extract_record(html, PROFILE_URL, false);
    assert_eq!(record.offices.len(), 1);
}

#[test]
fn flat_address_contributes_fields_without_an_office_by_default() {
    let html = r#"
        <script type="application/ld+json">
        {"@type": "Person", "name": "دکتر سارا",
         "streetAddress": "میدان آزادی", "addressLocality": "تهران"}
        </script>
    "#;
    let record = extract_record(html, PROFILE_URL, false);
    assert!(record.offices.is_empty());
    assert_eq!(record.city, "تهران");
    assert_eq!(record.addresses, vec!["میدان آزادی"]);
}

#[test]
fn flat_address_seeds_an_office_when_enabled() {
    let html = r#"
        <script type="application/ld+json">
        {"@type": "Person", "name": "دکتر سارا",
         "streetAddress": "میدان آزادی", "addressLocality": "تهران"}
        </script>
    "#;
    let record = extract_record(html, PROFILE_URL, true);
    assert_eq!(record.offices.len(), 1);
    assert_eq!(record.offices[0].city, "تهران");
    assert_eq!(record.offices[0].addresses, vec!["میدان آزادی"]);
}

#[test]
fn page_wide_address_pass_runs_only_without_offices() {
    let bare = r#"<div class="addr">خیابان انقلاب</div>"#;
    let record = extract_record(bare, PROFILE_URL, false);
    assert!(record.offices.is_empty());
    assert_eq!(record.addresses, vec!["خیابان انقلاب"]);

    let with_office = r#"
        <div class="office">
            <div class="address">خیابان ولیعصر</div>
        </div>
        <div class="addr">خیابان انقلاب</div>
    "#;
    let record = extract_record(with_office, PROFILE_URL, false);
    assert_eq!(record.offices.len(), 1);
    assert_eq!(record.addresses, vec!["خیابان ولیعصر"]);
}

// ---------------------------------------------------------------------------
// extract_record: phones
// ---------------------------------------------------------------------------

#[test]
fn phone_sources_union_and_dedup_on_digit_key() {
    let html = r#"
        <script type="application/ld+json">
        {"@type": "Physician", "name": "x", "telephone": "۰۲۱۱۲۳۴۵۶۷۸"}
        </script>
        <span class="phone">021-12345678 / 021-99999999</span>
        <a href="tel:0219999 9999">تماس</a>
        <div data-phone="05137654321"></div>
    "#;
    let record = extract_record(html, PROFILE_URL, false);
    assert_eq!(
        record.phones,
        vec!["021-12345678", "021-99999999", "05137654321"]
    );
}

#[test]
fn multi_number_container_splits_on_persian_separator() {
    let html = r#"<span class="tel-number">۰۲۱۱۱۱۱۱۱۱۱، ۰۲۱۲۲۲۲۲۲۲۲</span>"#;
    let record = extract_record(html, PROFILE_URL, false);
    assert_eq!(record.phones, vec!["02111111111", "02122222222"]);
}
