//! CSV contact list loading.
//!
//! The first record is the header. Every later record becomes a
//! [`ContactRow`] keyed by header name, with cells kept as strings in
//! header order. Short rows are padded with empty cells; cells beyond the
//! header are dropped. An empty file is an empty list. Duplicate header
//! names are rejected, since a row cannot hold both cells.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

use warm_ranker_core::models::ContactRow;

/// Load contacts from a CSV file on disk.
pub fn load_contacts(path: &Path) -> Result<Vec<ContactRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open contact list: {}", path.display()))?;
    load_contacts_from_reader(file)
        .with_context(|| format!("Failed to parse contact list: {}", path.display()))
}

/// Load contacts from any CSV byte stream (e.g. an uploaded file).
pub fn load_contacts_from_reader<R: Read>(reader: R) -> Result<Vec<ContactRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Ok(Vec::new());
    }
    for (i, header) in headers.iter().enumerate() {
        if headers[..i].contains(header) {
            bail!("Duplicate CSV column: '{}'", header);
        }
    }

    let mut rows = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record {}", line + 1))?;
        let mut row = ContactRow::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = record.get(i).unwrap_or("");
            row.insert(header.clone(), Value::String(cell.to_string()));
        }
        rows.push(row);
    }

    Ok(rows)
}
