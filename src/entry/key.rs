//! Archive key layout
//!
//! `category=<CATEGORY>/year=<YYYY>/month=<MM>/day=<DD>/hour=<HH>/<timestamp>-<random>`
//!
//! The calendar segments are UTC and double as query-engine partitions. The
//! random suffix keeps concurrent uploads within the same millisecond apart.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::{DecodeError, Result};
use super::{Category, LogEntry, Origin};

const SUFFIX_LEN: usize = 12;

/// Attributes recoverable from an archive key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts {
    pub category: Category,
    pub timestamp: i64,
    pub suffix: String,
}

/// A category/day partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionDay {
    pub category: Category,
    pub date: NaiveDate,
}

impl PartitionDay {
    pub fn new(category: Category, date: NaiveDate) -> Self {
        Self { category, date }
    }

    /// Object-store prefix covering every hour of this day
    pub fn prefix(&self) -> String {
        format!("{}/", self)
    }
}

impl fmt::Display for PartitionDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "category={}/year={:04}/month={:02}/day={:02}",
            self.category,
            self.date.year(),
            self.date.month(),
            self.date.day()
        )
    }
}

impl FromStr for PartitionDay {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || DecodeError::MalformedKey(s.to_string());
        let segments: Vec<&str> = s.trim_end_matches('/').split('/').collect();
        if segments.len() < 4 {
            return Err(malformed());
        }

        let category = segment(segments[0], "category").ok_or_else(malformed)?.parse()?;
        let year = number(segments[1], "year").ok_or_else(malformed)?;
        let month = number(segments[2], "month").ok_or_else(malformed)?;
        let day = number(segments[3], "day").ok_or_else(malformed)?;
        let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(malformed)?;

        Ok(Self { category, date })
    }
}

/// `category=<CATEGORY>/`
pub fn category_prefix(category: Category) -> String {
    format!("category={}/", category)
}

/// Build a key from its parts
pub fn archive_key_for(category: Category, datetime: DateTime<Utc>, suffix: &str) -> String {
    let day = PartitionDay::new(category, datetime.date_naive());
    format!(
        "{}/hour={:02}/{}-{}",
        day,
        datetime.hour(),
        datetime.timestamp_millis(),
        suffix
    )
}

/// Assign a new archive key to `entry` (random suffix each call)
pub fn encode_archive_key(entry: &LogEntry) -> Option<String> {
    let datetime = entry.datetime()?;
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(SUFFIX_LEN).collect();
    Some(archive_key_for(entry.category(), datetime, &suffix))
}

/// Parse a key, checking the calendar segments agree with the timestamp
pub fn parse_archive_key(key: &str) -> Result<KeyParts> {
    let malformed = || DecodeError::MalformedKey(key.to_string());

    let segments: Vec<&str> = key.split('/').collect();
    if segments.len() != 6 {
        return Err(malformed());
    }

    let day: PartitionDay = segments[..4].join("/").parse().map_err(|err| match err {
        DecodeError::UnknownCategory(_) => err,
        _ => malformed(),
    })?;
    let hour = number(segments[4], "hour").ok_or_else(malformed)?;

    let (timestamp, suffix) = segments[5].split_once('-').ok_or_else(malformed)?;
    let timestamp: i64 = timestamp.parse().map_err(|_| malformed())?;
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(malformed());
    }

    let datetime = DateTime::from_timestamp_millis(timestamp).ok_or_else(malformed)?;
    if datetime.date_naive() != day.date || datetime.hour() != hour {
        return Err(malformed());
    }

    Ok(KeyParts {
        category: day.category,
        timestamp,
        suffix: suffix.to_string(),
    })
}

/// Recover the key-derivable view of an entry.
///
/// The payload is not in the key, so the returned entry carries the key as
/// its only message and is only [`similar`](LogEntry::similar) to the original.
pub fn decode_archive_key(key: &str) -> Result<LogEntry> {
    let parts = parse_archive_key(key)?;
    let mut entry = LogEntry::builder()
        .category(parts.category)
        .messages(vec![key.to_string()])
        .timestamp(parts.timestamp)
        .origin(Origin::Restored)
        .build();
    entry.archive_key = Some(key.to_string());
    Ok(entry)
}

fn segment<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.strip_prefix(name)?.strip_prefix('=')
}

fn number(raw: &str, name: &str) -> Option<u32> {
    segment(raw, name)?.parse().ok()
}
