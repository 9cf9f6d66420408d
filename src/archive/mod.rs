//! Durable, partitioned archive of log entries
//!
//! Entries are stored as canonical structured JSON under their archive key
//! (`category=…/year=…/month=…/day=…/hour=…/<timestamp>-<suffix>`) in any
//! `object_store` backend. Day partitions double as the unit the query
//! engine catalogs and prunes.

mod error;

pub use error::{ArchiveError, Result};

use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use futures::{StreamExt, TryStreamExt};
use object_store::{ObjectStore, path::Path as StoragePath, prefix::PrefixStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ArchiveConfig, ArchiveProvider, Config};
use crate::entry::{
    category_prefix, decode_archive_key, decode_structured, encode_archive_key, encode_canonical,
    parse_archive_key, Category, KeyParts, LogEntry, PartitionDay,
};

/// Ranges longer than this are resolved with one category-wide listing
/// instead of one listing per day.
const MAX_DAY_LISTINGS: i64 = 92;

/// Archive client wrapping object_store
#[derive(Clone)]
pub struct ArchiveStore {
    store: Arc<dyn ObjectStore>,
    similarity_window: Duration,
    max_parallel: usize,
}

impl ArchiveStore {
    /// Create an archive over any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            similarity_window: Duration::from_secs(1),
            max_parallel: 8,
        }
    }

    /// Create in-memory archive for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()))
    }

    /// Build the archive described by the `[archive]` section
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = backend(&config.archive)?;
        Ok(Self::new(store)
            .with_similarity_window(config.dedup.similarity_window.as_duration())
            .with_max_parallel(config.search.max_parallel_connections))
    }

    /// Tolerance when checking a payload against the key it was stored under
    pub fn with_similarity_window(mut self, window: Duration) -> Self {
        self.similarity_window = window;
        self
    }

    /// Maximum concurrent object fetches per call
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Persist an entry, assigning its archive key first if it has none.
    ///
    /// The key is recorded on the entry only once the put succeeded.
    /// Uploading an already keyed entry overwrites the same object.
    pub async fn upload(&self, entry: &mut LogEntry) -> Result<String> {
        let key = match entry.archive_key() {
            Some(key) => key.to_string(),
            None => encode_archive_key(entry).ok_or(ArchiveError::Unkeyable(entry.timestamp()))?,
        };

        let mut keyed = entry.clone();
        keyed.set_archive_key(key.as_str())?;
        let payload = encode_canonical(&keyed)?;
        let size = payload.len();

        self.store
            .put(&StoragePath::from(key.as_str()), payload.into())
            .await?;
        entry.set_archive_key(key.as_str())?;

        tracing::debug!(key = %key, size, "Archived log entry");
        Ok(key)
    }

    /// Fetch and decode one entry
    pub async fn fetch_by_key(&self, key: &str) -> Result<LogEntry> {
        let decode_err = |source| ArchiveError::Decode {
            key: key.to_string(),
            source,
        };

        let from_key = decode_archive_key(key).map_err(decode_err)?;
        let payload = self.get_payload(key).await?;
        let mut entry = decode_structured(&payload).map_err(decode_err)?;

        if !entry.similar(&from_key, self.similarity_window) {
            return Err(ArchiveError::KeyMismatch {
                key: key.to_string(),
            });
        }
        entry
            .set_archive_key(key)
            .map_err(|_| ArchiveError::KeyMismatch {
                key: key.to_string(),
            })?;

        Ok(entry)
    }

    /// Up to `max_entries` entries of `category` stamped within `[start, end]`,
    /// newest first.
    ///
    /// Undecodable objects are skipped and older candidates take their place,
    /// so the result is only short when the window runs out of valid entries.
    pub async fn fetch_by_date_range(
        &self,
        category: Category,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_entries: usize,
    ) -> Result<Vec<LogEntry>> {
        if start > end || max_entries == 0 {
            return Ok(Vec::new());
        }

        let (start_ms, end_ms) = (start.timestamp_millis(), end.timestamp_millis());
        let in_window = |(_, parts): &(String, KeyParts)| {
            parts.timestamp >= start_ms && parts.timestamp <= end_ms
        };

        let mut page = Page::new(max_entries);
        let span = (end.date_naive() - start.date_naive()).num_days();
        if span > MAX_DAY_LISTINGS {
            let mut keys = self.list_keys(&category_prefix(category)).await?;
            keys.retain(in_window);
            self.fill_page(keys, &mut page).await;
        } else {
            for date in days_newest_first(start.date_naive(), end.date_naive()) {
                let mut keys = self.list_day(&PartitionDay::new(category, date)).await?;
                keys.retain(in_window);
                self.fill_page(keys, &mut page).await;

                // every older day holds only older entries
                if page.is_full() {
                    break;
                }
            }
        }

        if page.discarded > 0 {
            tracing::warn!(
                category = %category,
                discarded = page.discarded,
                returned = page.entries.len(),
                "Discarded undecodable archive objects"
            );
        }

        Ok(page.entries)
    }

    /// Fetch `keys` newest first, `max_parallel` at a time, until the page is full
    async fn fill_page(&self, mut keys: Vec<(String, KeyParts)>, page: &mut Page) {
        keys.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));

        for batch in keys.chunks(self.max_parallel) {
            let missing = page.missing();
            if missing == 0 {
                break;
            }

            let fetches: Vec<_> = batch[..batch.len().min(missing)]
                .iter()
                .map(|(key, _)| async move { (key, self.fetch_by_key(key).await) })
                .collect();
            let fetched: Vec<(&String, Result<LogEntry>)> =
                futures::stream::iter(fetches)
                    .buffered(self.max_parallel)
                    .collect()
                    .await;

            for (key, result) in fetched {
                match result {
                    Ok(entry) => page.entries.push(entry),
                    Err(err) => {
                        tracing::debug!(key = %key, error = %err, "Discarded archive object");
                        page.discarded += 1;
                    }
                }
            }
        }
    }

    /// Keys of one day partition with their parsed parts; foreign objects are skipped
    pub async fn list_day(&self, day: &PartitionDay) -> Result<Vec<(String, KeyParts)>> {
        self.list_keys(&day.prefix()).await
    }

    /// Every day partition holding at least one object
    pub async fn list_partitions(&self) -> Result<BTreeSet<PartitionDay>> {
        let objects: Vec<_> = self.store.list(None).try_collect().await?;
        let mut days = BTreeSet::new();

        for meta in objects {
            let location = meta.location.as_ref();
            let day = location
                .splitn(5, '/')
                .take(4)
                .collect::<Vec<_>>()
                .join("/")
                .parse::<PartitionDay>();
            match day {
                Ok(day) => {
                    days.insert(day);
                }
                Err(_) => tracing::debug!(location, "Skipping object outside partition layout"),
            }
        }

        Ok(days)
    }

    /// Raw payload stored under `key`
    pub async fn get_payload(&self, key: &str) -> Result<Bytes> {
        let result = match self.store.get(&StoragePath::from(key)).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(ArchiveError::NotFound(key.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(result.bytes().await?)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<(String, KeyParts)>> {
        let prefix = StoragePath::from(prefix);
        let objects: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;

        Ok(objects
            .into_iter()
            .filter_map(|meta| {
                let key = meta.location.to_string();
                match parse_archive_key(&key) {
                    Ok(parts) => Some((key, parts)),
                    Err(err) => {
                        tracing::debug!(key = %key, error = %err, "Skipping foreign archive object");
                        None
                    }
                }
            })
            .collect())
    }
}

fn backend(config: &ArchiveConfig) -> Result<Arc<dyn ObjectStore>> {
    let inner: Arc<dyn ObjectStore> = match config.provider {
        ArchiveProvider::Memory => Arc::new(object_store::memory::InMemory::new()),
        ArchiveProvider::Local => {
            std::fs::create_dir_all(&config.root)?;
            Arc::new(object_store::local::LocalFileSystem::new_with_prefix(
                &config.root,
            )?)
        }
    };

    tracing::info!(
        provider = ?config.provider,
        prefix = %config.prefix,
        "Archive backend ready"
    );

    if config.prefix.trim_matches('/').is_empty() {
        return Ok(inner);
    }
    Ok(Arc::new(PrefixStore::new(
        inner,
        config.prefix.trim_matches('/'),
    )))
}

/// Entries collected so far by a range fetch
struct Page {
    entries: Vec<LogEntry>,
    wanted: usize,
    discarded: usize,
}

impl Page {
    fn new(wanted: usize) -> Self {
        Self {
            entries: Vec::with_capacity(wanted.min(1024)),
            wanted,
            discarded: 0,
        }
    }

    fn missing(&self) -> usize {
        self.wanted.saturating_sub(self.entries.len())
    }

    fn is_full(&self) -> bool {
        self.missing() == 0
    }
}

fn days_newest_first(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let span = (end - start).num_days().max(0);
    (0..=span).map(move |offset| end - ChronoDuration::days(offset))
}
