//! CSV export of scraped records.
//!
//! The sheet has a fixed base column set plus dynamic per-office-position
//! columns sized to the widest record: office N contributes one city
//! column, as many address columns as the largest address list any record
//! has at position N, and phone columns likewise. Values are quoted per
//! RFC 4180 and the file starts with a UTF-8 BOM so spreadsheet tools
//! pick up the Persian text encoding.

use base64::Engine as _;
use chrono::{DateTime, Utc};

use nobat_core::DoctorRecord;

use crate::browser::{Browser, DownloadPayload};
use crate::error::ScrapeError;
use crate::site;

const BOM: &str = "\u{FEFF}";
const LIST_JOIN: &str = ";";

/// Widths of the dynamic office columns across a record set.
#[derive(Debug, Default, PartialEq, Eq)]
struct OfficeLayout {
    /// Per office position: (max addresses, max phones).
    positions: Vec<(usize, usize)>,
}

impl OfficeLayout {
    fn of(records: &[DoctorRecord]) -> Self {
        let mut positions: Vec<(usize, usize)> = Vec::new();
        for record in records {
            for (i, office) in record.offices.iter().enumerate() {
                if positions.len() <= i {
                    positions.resize(i + 1, (0, 0));
                }
                positions[i].0 = positions[i].0.max(office.addresses.len());
                positions[i].1 = positions[i].1.max(office.phones.len());
            }
        }
        Self { positions }
    }
}

/// Renders the full CSV document, BOM and header included.
#[must_use]
pub fn build_csv(records: &[DoctorRecord]) -> String {
    let layout = OfficeLayout::of(records);

    let mut header: Vec<String> = [
        "url",
        "name",
        "specialty",
        "code",
        "city",
        "addresses",
        "phones",
        "error",
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect();
    for (i, (addr_max, phone_max)) in layout.positions.iter().enumerate() {
        let n = i + 1;
        header.push(format!("office{n}_city"));
        for j in 1..=*addr_max {
            header.push(format!("office{n}_address{j}"));
        }
        for j in 1..=*phone_max {
            header.push(format!("office{n}_phone{j}"));
        }
    }

    let mut out = String::from(BOM);
    out.push_str(&render_row(&header));
    for record in records {
        out.push_str(&render_row(&record_row(record, &layout)));
    }
    out
}

fn record_row(record: &DoctorRecord, layout: &OfficeLayout) -> Vec<String> {
    let mut row = vec![
        record.url.clone(),
        record.name.clone(),
        record.specialty.clone(),
        record.code.clone(),
        record.city.clone(),
        record.addresses.join(LIST_JOIN),
        record.phones.join(LIST_JOIN),
        record.error.clone().unwrap_or_default(),
    ];
    for (i, (addr_max, phone_max)) in layout.positions.iter().enumerate() {
        let office = record.offices.get(i);
        row.push(office.map(|o| o.city.clone()).unwrap_or_default());
        for j in 0..*addr_max {
            row.push(
                office
                    .and_then(|o| o.addresses.get(j).cloned())
                    .unwrap_or_default(),
            );
        }
        for j in 0..*phone_max {
            row.push(
                office
                    .and_then(|o| o.phones.get(j).cloned())
                    .unwrap_or_default(),
            );
        }
    }
    row
}

fn render_row(fields: &[String]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

/// Export filename: prefix, UTC second-precision timestamp with `:` and
/// `T` flattened to `-`, `.csv` extension.
#[must_use]
pub fn export_filename(partial: bool, now: DateTime<Utc>) -> String {
    let prefix = if partial {
        site::EXPORT_PREFIX_PARTIAL
    } else {
        site::EXPORT_PREFIX
    };
    let stamp = now
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
        .replace([':', 'T'], "-");
    format!("{prefix}-{stamp}.csv")
}

fn data_uri(bytes: &[u8]) -> String {
    format!(
        "data:text/csv;charset=utf-8;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Builds the CSV and hands it to the backend: raw bytes first, then the
/// identical content as a base64 data URI when the byte path fails.
///
/// # Errors
///
/// Returns [`ScrapeError::Export`] only when both delivery paths fail.
pub async fn deliver_export<B: Browser>(
    browser: &B,
    records: &[DoctorRecord],
    partial: bool,
) -> Result<String, ScrapeError> {
    let csv = build_csv(records);
    let filename = export_filename(partial, Utc::now());

    match browser
        .download(&filename, DownloadPayload::Bytes(csv.clone().into_bytes()))
        .await
    {
        Ok(()) => {
            tracing::info!(filename, rows = records.len(), "export delivered");
            return Ok(filename);
        }
        Err(primary) => {
            tracing::warn!(error = %primary, "byte download failed; trying data URI");
            if let Err(fallback) = browser
                .download(&filename, DownloadPayload::DataUri(data_uri(csv.as_bytes())))
                .await
            {
                return Err(ScrapeError::Export {
                    reason: format!("primary: {primary}; fallback: {fallback}"),
                });
            }
        }
    }
    tracing::info!(filename, rows = records.len(), "export delivered via data URI");
    Ok(filename)
}
