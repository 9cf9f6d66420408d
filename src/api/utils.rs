//! API utility functions
//!
//! Pure, stateless helpers for request parsing, kept out of services.rs so
//! they can be unit tested.

use chrono::{DateTime, Utc};

use crate::api::error::ApiError;
use crate::entry::Category;

/// Parse a category path or query segment (case-insensitive)
pub fn parse_category(raw: &str) -> Result<Category, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidQuery(format!("unknown category: {}", raw)))
}

/// Epoch milliseconds as a UTC datetime
pub fn parse_millis(millis: i64) -> Result<DateTime<Utc>, ApiError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ApiError::InvalidQuery(format!("timestamp out of range: {}", millis)))
}

/// Offset encoded by a pagination cursor; no cursor means the first page
pub fn parse_cursor(cursor: Option<&str>) -> Result<usize, ApiError> {
    match cursor {
        None | Some("") => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::InvalidQuery(format!("invalid cursor: {}", raw))),
    }
}

pub fn encode_cursor(offset: usize) -> String {
    offset.to_string()
}

/// `Content-Disposition` for a category's buffer download
pub fn attachment_disposition(category: Category) -> String {
    format!("attachment; filename=\"{}.log\"", category.file_stem())
}
