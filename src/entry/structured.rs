//! Flat JSON record
//!
//! `{timestamp, category, messages, searchText, stackTrace?, archiveKey?, duplicates?}`
//!
//! `searchText` is always recomputed on decode and `duplicates` is a view-only
//! field that decoding ignores. The canonical form written to the archive
//! leaves `duplicates` out.

use serde::{Deserialize, Serialize, Serializer};

use super::error::{DecodeError, Result};
use super::{Category, LogEntry, Origin};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredView<'a> {
    timestamp: i64,
    category: Category,
    messages: &'a [String],
    search_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack_trace: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    duplicates: Vec<String>,
}

impl<'a> StructuredView<'a> {
    fn of(entry: &'a LogEntry, with_duplicates: bool) -> Self {
        let duplicates = if with_duplicates {
            entry.duplicates().iter().map(|d| d.to_wire()).collect()
        } else {
            Vec::new()
        };

        Self {
            timestamp: entry.timestamp(),
            category: entry.category(),
            messages: entry.messages(),
            search_text: entry.search_text(),
            stack_trace: entry.stack_trace(),
            archive_key: entry.archive_key(),
            duplicates,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredRecord {
    timestamp: i64,
    category: Category,
    messages: Vec<String>,
    #[serde(default)]
    stack_trace: Option<Vec<String>>,
    #[serde(default)]
    archive_key: Option<String>,
}

/// Encode the full view of an entry, duplicates included
pub fn encode_structured(entry: &LogEntry) -> serde_json::Result<String> {
    serde_json::to_string(&StructuredView::of(entry, true))
}

/// Encode the canonical record persisted in the archive
pub fn encode_canonical(entry: &LogEntry) -> serde_json::Result<String> {
    serde_json::to_string(&StructuredView::of(entry, false))
}

/// Decode a structured record, applying defaults for optional fields
pub fn decode_structured(payload: &[u8]) -> Result<LogEntry> {
    let record: StructuredRecord = serde_json::from_slice(payload)?;

    let mut entry = LogEntry::builder()
        .category(record.category)
        .messages(record.messages)
        .maybe_stack_trace(record.stack_trace)
        .timestamp(record.timestamp)
        .origin(Origin::Restored)
        .build();

    entry.archive_key = record.archive_key;

    let violations = entry.validate();
    if !violations.is_empty() {
        return Err(DecodeError::Invalid(violations));
    }
    Ok(entry)
}

impl Serialize for LogEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        StructuredView::of(self, true).serialize(serializer)
    }
}
