//! Request and response shapes of the read API
//!
//! Entries are serialized in their structured form:
//!
//! ```json
//! {
//!   "timestamp": 1714557600123,
//!   "category": "ERROR",
//!   "messages": ["payment provider unreachable"],
//!   "searchText": "payment provider unreachable",
//!   "stackTrace": ["src/payments.rs:88:13"],
//!   "archiveKey": "category=ERROR/year=2024/month=05/day=01/hour=10/1714557600123-3f2a9c1b7d4e",
//!   "duplicates": ["category=ERROR/year=2024/month=05/day=01/hour=10/1714557690001-9b1c2d3e4f5a"]
//! }
//! ```
//!
//! Time bounds are epoch milliseconds. Search pagination uses an opaque
//! `cursor` returned as `next_cursor` while more results exist.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entry::LogEntry;
use crate::local::ReadOrder;
use crate::observability::FailureSnapshot;

/// `GET /logs/search`
#[derive(Debug, Deserialize, Clone)]
pub struct SearchParams {
    pub category: String,
    pub term: String,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub merge: bool,
}

/// `GET /logs/local/{category}`
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LocalReadParams {
    #[serde(default)]
    pub limit: Option<usize>,
    /// Skip records stamped after this instant
    #[serde(default)]
    pub before: Option<i64>,
    #[serde(default)]
    pub order: ReadOrder,
}

/// `POST /logs/local/{category}/reset`
#[derive(Debug, Deserialize, Clone)]
pub struct ResetParams {
    pub retain: usize,
}

#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub entries: Vec<LogEntry>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub retained: usize,
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub failures: FailureSnapshot,
    pub version: String,
}
