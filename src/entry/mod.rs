//! Canonical log entry model and its codecs
//!
//! A [`LogEntry`] is the only entity the pipeline moves around. It is built by
//! the facade, written to the local buffer as a text record, archived as a
//! structured JSON record under a partitioned key, and decoded back by the
//! read paths.
//!
//! Codecs:
//! - text ([`encode_text`] / [`decode_text`]): human-readable multi-line record
//! - structured ([`encode_structured`] / [`decode_structured`]): flat JSON object
//! - archive key ([`encode_archive_key`] / [`decode_archive_key`]): partitioned
//!   object key that only carries category and timestamp
//!
//! Every decoder returns `Result<LogEntry, DecodeError>` and validates the
//! entry before handing it out.

mod category;
mod error;
mod key;
mod merge;
mod structured;
mod text;

pub use category::Category;
pub use error::{DecodeError, EntryError, Result};
pub use key::{
    archive_key_for, category_prefix, decode_archive_key, encode_archive_key, parse_archive_key,
    KeyParts, PartitionDay,
};
pub use merge::{merge_duplicates, MergePolicy};
pub use structured::{decode_structured, encode_canonical, encode_structured};
pub use text::{decode_text, encode_text, frame_record, split_records};

use bon::bon;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// How far into the future a freshly created entry may be stamped
pub const MAX_FUTURE_SKEW_MS: i64 = 5 * 60 * 1000;

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Where an entry came from; only consulted by validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Created in this process
    Fresh,
    /// Reconstructed from the local buffer or the archive
    Restored,
}

/// A broken entry invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    NegativeTimestamp { timestamp: i64 },
    EmptyMessages,
    UnexpectedStackTrace { category: Category },
    TimestampInFuture { timestamp: i64 },
}

/// Reference to an entry folded into a representative by [`merge_duplicates`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRef {
    pub archive_key: Option<String>,
    pub timestamp: i64,
}

impl DuplicateRef {
    /// Wire form: the archive key when known, `@<timestamp>` otherwise
    pub fn to_wire(&self) -> String {
        match &self.archive_key {
            Some(key) => key.clone(),
            None => format!("@{}", self.timestamp),
        }
    }
}

/// One logged event
#[derive(Debug, Clone)]
pub struct LogEntry {
    category: Category,
    timestamp: i64,
    messages: Vec<String>,
    stack_trace: Option<Vec<String>>,
    search_text: String,
    archive_key: Option<String>,
    duplicates: Vec<DuplicateRef>,
    origin: Origin,
}

#[bon]
impl LogEntry {
    /// Build an entry; `timestamp` defaults to now and `origin` to [`Origin::Fresh`]
    #[builder]
    pub fn new(
        category: Category,
        messages: Vec<String>,
        stack_trace: Option<Vec<String>>,
        timestamp: Option<i64>,
        #[builder(default = Origin::Fresh)] origin: Origin,
    ) -> Self {
        let search_text = derive_search_text(&messages);
        Self {
            category,
            timestamp: timestamp.unwrap_or_else(now_millis),
            messages,
            stack_trace: stack_trace.filter(|frames| !frames.is_empty()),
            search_text,
            archive_key: None,
            duplicates: Vec::new(),
            origin,
        }
    }
}

impl LogEntry {
    /// Fresh entry stamped with the current time
    pub fn record<I, S>(category: Category, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder()
            .category(category)
            .messages(messages.into_iter().map(Into::into).collect())
            .build()
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Timestamp as a UTC datetime, `None` if it is out of chrono's range
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn stack_trace(&self) -> Option<&[String]> {
        self.stack_trace.as_deref()
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn archive_key(&self) -> Option<&str> {
        self.archive_key.as_deref()
    }

    pub fn duplicates(&self) -> &[DuplicateRef] {
        &self.duplicates
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Record the archive key. Setting the same key twice is a no-op.
    pub fn set_archive_key(&mut self, key: impl Into<String>) -> std::result::Result<(), EntryError> {
        let key = key.into();
        match &self.archive_key {
            None => {
                self.archive_key = Some(key);
                Ok(())
            }
            Some(existing) if *existing == key => Ok(()),
            Some(existing) => Err(EntryError::ArchiveKeyAlreadySet {
                existing: existing.clone(),
                attempted: key,
            }),
        }
    }

    /// List every violated invariant, judged against the current clock
    pub fn validate(&self) -> Vec<Violation> {
        self.validate_at(now_millis())
    }

    /// List every violated invariant, judged against `now` (epoch millis)
    pub fn validate_at(&self, now: i64) -> Vec<Violation> {
        let mut violations = Vec::new();

        if self.timestamp < 0 {
            violations.push(Violation::NegativeTimestamp {
                timestamp: self.timestamp,
            });
        }
        if self.messages.is_empty() {
            violations.push(Violation::EmptyMessages);
        }
        if self.stack_trace.is_some() && !self.category.carries_trace() {
            violations.push(Violation::UnexpectedStackTrace {
                category: self.category,
            });
        }
        if self.origin == Origin::Fresh && self.timestamp > now.saturating_add(MAX_FUTURE_SKEW_MS) {
            violations.push(Violation::TimestampInFuture {
                timestamp: self.timestamp,
            });
        }

        violations
    }

    pub fn validate_check(&self) -> bool {
        self.validate().is_empty()
    }

    /// Same category and timestamps no further apart than `window`
    pub fn similar(&self, other: &LogEntry, window: Duration) -> bool {
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self.category == other.category && self.timestamp.abs_diff(other.timestamp) <= window_ms
    }

    /// Fold `other` into this entry's duplicate list
    pub(crate) fn absorb(&mut self, other: LogEntry) {
        self.duplicates.push(DuplicateRef {
            archive_key: other.archive_key,
            timestamp: other.timestamp,
        });
        self.duplicates.extend(other.duplicates);
    }
}

impl PartialEq for LogEntry {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category
            && self.timestamp == other.timestamp
            && self.messages == other.messages
            && self.stack_trace == other.stack_trace
    }
}

impl Eq for LogEntry {}

fn derive_search_text(messages: &[String]) -> String {
    messages
        .iter()
        .map(|message| message.trim())
        .filter(|message| !message.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(category: Category, messages: &[&str], timestamp: i64) -> LogEntry {
        LogEntry::builder()
            .category(category)
            .messages(messages.iter().map(|m| m.to_string()).collect())
            .timestamp(timestamp)
            .build()
    }

    #[test]
    fn test_search_text_is_normalized() {
        let entry = entry(Category::Event, &["  User JOINED ", "Circle Created"], 1);
        assert_eq!(entry.search_text(), "user joined circle created");
    }

    #[test]
    fn test_empty_trace_is_absent() {
        let entry = LogEntry::builder()
            .category(Category::Error)
            .messages(vec!["boom".into()])
            .stack_trace(Vec::new())
            .build();
        assert!(entry.stack_trace().is_none());
    }

    #[test]
    fn test_validate_reports_every_violation() {
        let entry = LogEntry::builder()
            .category(Category::Event)
            .messages(Vec::new())
            .stack_trace(vec!["src/main.rs:1:1".into()])
            .timestamp(-5)
            .build();

        let violations = entry.validate_at(0);
        assert_eq!(
            violations,
            vec![
                Violation::NegativeTimestamp { timestamp: -5 },
                Violation::EmptyMessages,
                Violation::UnexpectedStackTrace {
                    category: Category::Event
                },
            ]
        );
        assert!(!entry.validate_check());
    }

    #[test]
    fn test_future_timestamp_only_rejected_when_fresh() {
        let now = 1_700_000_000_000;
        let future = now + MAX_FUTURE_SKEW_MS + 1;
        let fresh = entry(Category::Event, &["ping"], future);
        assert_eq!(
            fresh.validate_at(now),
            vec![Violation::TimestampInFuture { timestamp: future }]
        );

        let restored = LogEntry::builder()
            .category(Category::Event)
            .messages(vec!["ping".into()])
            .timestamp(future)
            .origin(Origin::Restored)
            .build();
        assert!(restored.validate_at(now).is_empty());
    }

    #[test]
    fn test_archive_key_set_once() {
        let mut entry = entry(Category::Db, &["slow query"], 10);
        entry.set_archive_key("a").unwrap();
        entry.set_archive_key("a").unwrap();

        let err = entry.set_archive_key("b").unwrap_err();
        assert_eq!(
            err,
            EntryError::ArchiveKeyAlreadySet {
                existing: "a".into(),
                attempted: "b".into()
            }
        );
        assert_eq!(entry.archive_key(), Some("a"));
    }

    #[test]
    fn test_equality_ignores_duplicates_and_key() {
        let mut left = entry(Category::Warn, &["disk"], 100);
        let right = entry(Category::Warn, &["disk"], 100);
        left.set_archive_key("k").unwrap();
        left.absorb(entry(Category::Warn, &["disk"], 50));

        assert_eq!(left, right);
        assert_ne!(left, entry(Category::Warn, &["disk"], 101));
        assert_ne!(left, entry(Category::Warn, &["disk", "full"], 100));
    }

    #[test]
    fn test_similar_window() {
        let a = entry(Category::Auth, &["login"], 1_000);
        let b = entry(Category::Auth, &["logout"], 1_900);
        let c = entry(Category::Event, &["login"], 1_000);

        assert!(a.similar(&b, Duration::from_secs(1)));
        assert!(!a.similar(&b, Duration::from_millis(500)));
        assert!(!a.similar(&c, Duration::from_secs(60)));
    }

    #[test]
    fn test_duplicate_wire_form() {
        let keyed = DuplicateRef {
            archive_key: Some("category=DB/x".into()),
            timestamp: 1,
        };
        let bare = DuplicateRef {
            archive_key: None,
            timestamp: 42,
        };
        assert_eq!(keyed.to_wire(), "category=DB/x");
        assert_eq!(bare.to_wire(), "@42");
    }
}
