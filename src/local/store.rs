use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::LocalConfig;
use crate::entry::{decode_text, frame_record, split_records, Category, LogEntry};

use super::error::{LocalStoreError, Result};
use super::generations::{
    active_path, file_len, generation_path, list_generations, read_or_empty, scratch_path,
};

/// Size limits for one category's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Upper bound for the active buffer plus every generation
    pub max_bytes: u64,
    /// Active buffer size that triggers rotation
    pub rollover_bytes: u64,
}

impl From<&LocalConfig> for RotationPolicy {
    fn from(config: &LocalConfig) -> Self {
        Self {
            max_bytes: config.max_size.as_u64(),
            rollover_bytes: config.rollover_size.as_u64(),
        }
    }
}

/// Order of records returned by [`LocalStore::read`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadOrder {
    /// Oldest first
    #[default]
    Chronological,
    /// Newest first
    Reverse,
}

/// Per-category append-only text buffers with size-based rotation
pub struct LocalStore {
    dir: PathBuf,
    policy: RotationPolicy,
    writers: HashMap<Category, Mutex<()>>,
}

impl LocalStore {
    /// Open (or create) the buffer directory
    pub fn open<P: AsRef<Path>>(dir: P, policy: RotationPolicy) -> Result<Self> {
        if policy.rollover_bytes == 0 || policy.rollover_bytes > policy.max_bytes {
            return Err(LocalStoreError::InvalidPolicy {
                rollover: policy.rollover_bytes,
                max: policy.max_bytes,
            });
        }

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!(
            dir = %dir.display(),
            max_bytes = policy.max_bytes,
            rollover_bytes = policy.rollover_bytes,
            "Opened local log buffer"
        );

        let writers = Category::ALL
            .iter()
            .map(|category| (*category, Mutex::new(())))
            .collect();

        Ok(Self {
            dir,
            policy,
            writers,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    /// Append one entry to its category's active buffer, rotating as needed
    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let category = entry.category();
        let record = frame_record(entry);
        let size = record.len() as u64;

        if size > self.policy.rollover_bytes {
            return Err(LocalStoreError::RecordTooLarge {
                size,
                limit: self.policy.rollover_bytes,
            });
        }

        let _guard = self.lock(category);
        let active = active_path(&self.dir, category);
        let active_size = file_len(&active)?;

        if active_size > 0 && active_size + size > self.policy.rollover_bytes {
            self.rotate(category)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&active)?;
        file.write_all(record.as_bytes())?;

        self.enforce_max(category)?;
        Ok(())
    }

    /// Up to `max_entries` most recent decodable records, skipping anything
    /// stamped after `cutoff`
    pub fn read(
        &self,
        category: Category,
        max_entries: usize,
        cutoff: Option<i64>,
        order: ReadOrder,
    ) -> Result<Vec<LogEntry>> {
        let _guard = self.lock(category);
        let mut entries = self.decode_all(category)?;

        if let Some(cutoff) = cutoff {
            entries.retain(|entry| entry.timestamp() <= cutoff);
        }

        let skip = entries.len().saturating_sub(max_entries);
        let mut entries: Vec<LogEntry> = entries.into_iter().skip(skip).collect();

        if order == ReadOrder::Reverse {
            entries.reverse();
        }

        Ok(entries)
    }

    /// Keep only the `retain_latest` most recent records; returns them oldest first
    pub fn reset(&self, category: Category, retain_latest: usize) -> Result<Vec<LogEntry>> {
        let _guard = self.lock(category);
        let entries = self.decode_all(category)?;
        let skip = entries.len().saturating_sub(retain_latest);
        let retained: Vec<LogEntry> = entries.into_iter().skip(skip).collect();

        let scratch = scratch_path(&self.dir, category);
        let mut content = String::new();
        for entry in &retained {
            content.push_str(&frame_record(entry));
        }
        fs::write(&scratch, content)?;

        // retained copy goes in place before any history is dropped
        let generations = list_generations(&self.dir, category)?;
        fs::rename(&scratch, active_path(&self.dir, category))?;
        for (_, path) in generations {
            fs::remove_file(path)?;
        }

        info!(
            category = %category,
            retained = retained.len(),
            "Reset local log buffer"
        );
        Ok(retained)
    }

    /// Text of every generation followed by the active buffer
    pub fn raw(&self, category: Category) -> Result<String> {
        let _guard = self.lock(category);
        let mut out = String::new();
        for path in self.files_oldest_first(category)? {
            out.push_str(&read_or_empty(&path)?);
        }
        Ok(out)
    }

    /// Bytes held by a category across all its files
    pub fn total_size(&self, category: Category) -> Result<u64> {
        let _guard = self.lock(category);
        self.size_unlocked(category)
    }

    // The guarded data is `()`, so a poisoned lock carries no broken state.
    fn lock(&self, category: Category) -> MutexGuard<'_, ()> {
        self.writers[&category]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn files_oldest_first(&self, category: Category) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = list_generations(&self.dir, category)?
            .into_iter()
            .rev()
            .map(|(_, path)| path)
            .collect();
        files.push(active_path(&self.dir, category));
        Ok(files)
    }

    fn decode_all(&self, category: Category) -> Result<Vec<LogEntry>> {
        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for path in self.files_oldest_first(category)? {
            let content = read_or_empty(&path)?;
            for record in split_records(&content) {
                match decode_text(record) {
                    Ok(entry) => entries.push(entry),
                    Err(err) => {
                        debug!(path = %path.display(), error = %err, "Undecodable local record");
                        skipped += 1;
                    }
                }
            }
        }

        if skipped > 0 {
            warn!(category = %category, skipped, "Skipped undecodable local records");
        }

        Ok(entries)
    }

    /// Shift generations up by one and move the active buffer to generation 1
    fn rotate(&self, category: Category) -> Result<()> {
        for (generation, path) in list_generations(&self.dir, category)?.into_iter().rev() {
            fs::rename(path, generation_path(&self.dir, category, generation + 1))?;
        }
        fs::rename(
            active_path(&self.dir, category),
            generation_path(&self.dir, category, 1),
        )?;
        debug!(category = %category, "Rotated local log buffer");
        Ok(())
    }

    /// Delete oldest generations until the category fits in `max_bytes`
    fn enforce_max(&self, category: Category) -> Result<()> {
        let mut total = self.size_unlocked(category)?;
        let mut generations = list_generations(&self.dir, category)?;

        while total > self.policy.max_bytes {
            let Some((generation, path)) = generations.pop() else {
                break;
            };
            total -= file_len(&path)?;
            fs::remove_file(&path)?;
            debug!(category = %category, generation, "Evicted local log generation");
        }

        Ok(())
    }

    fn size_unlocked(&self, category: Category) -> Result<u64> {
        let mut total = 0;
        for path in self.files_oldest_first(category)? {
            total += file_len(&path)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const T0: i64 = 1_714_557_600_000;

    fn event(n: i64) -> LogEntry {
        LogEntry::builder()
            .category(Category::Event)
            .messages(vec![format!("event #{n}")])
            .timestamp(T0 + n * 1000)
            .build()
    }

    fn record_len(entry: &LogEntry) -> u64 {
        frame_record(entry).len() as u64
    }

    fn open(temp: &TempDir, max_bytes: u64, rollover_bytes: u64) -> LocalStore {
        LocalStore::open(
            temp.path(),
            RotationPolicy {
                max_bytes,
                rollover_bytes,
            },
        )
        .unwrap()
    }

    fn messages(entries: &[LogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.messages()[0].as_str()).collect()
    }

    #[test]
    fn test_append_and_read_back() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, 1024 * 1024, 64 * 1024);

        for n in 1..=3 {
            store.append(&event(n)).unwrap();
        }

        let entries = store
            .read(Category::Event, 10, None, ReadOrder::Chronological)
            .unwrap();
        assert_eq!(messages(&entries), vec!["event #1", "event #2", "event #3"]);
        assert_eq!(entries[0], event(1));

        let reversed = store
            .read(Category::Event, 2, None, ReadOrder::Reverse)
            .unwrap();
        assert_eq!(messages(&reversed), vec!["event #3", "event #2"]);
    }

    #[test]
    fn test_rollover_keeps_two_most_recent() {
        let temp = TempDir::new().unwrap();
        let len = record_len(&event(1));
        // one record per file, room for two files
        let store = open(&temp, 2 * len + len / 2, 2 * len - 1);

        for n in 1..=3 {
            store.append(&event(n)).unwrap();
        }

        let entries = store
            .read(Category::Event, 2, None, ReadOrder::Chronological)
            .unwrap();
        assert_eq!(messages(&entries), vec!["event #2", "event #3"]);

        let all = store
            .read(Category::Event, 10, None, ReadOrder::Chronological)
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(generation_path(temp.path(), Category::Event, 1).exists());
        assert!(!generation_path(temp.path(), Category::Event, 2).exists());
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let temp = TempDir::new().unwrap();
        let len = record_len(&event(1));
        let max_bytes = 7 * len;
        let store = open(&temp, max_bytes, 3 * len);

        for n in 1..=50 {
            store.append(&event(n)).unwrap();
            assert!(store.total_size(Category::Event).unwrap() <= max_bytes);
        }

        let entries = store
            .read(Category::Event, 100, None, ReadOrder::Chronological)
            .unwrap();
        let last = entries.last().unwrap();
        assert_eq!(last.messages()[0], "event #50");
        assert!(entries.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));
    }

    #[test]
    fn test_record_too_large() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, 1024, 16);

        let err = store.append(&event(1)).unwrap_err();
        assert!(matches!(err, LocalStoreError::RecordTooLarge { limit: 16, .. }));
        assert_eq!(store.total_size(Category::Event).unwrap(), 0);
    }

    #[test]
    fn test_categories_are_independent() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, 1024 * 1024, 64 * 1024);

        store.append(&event(1)).unwrap();
        store
            .append(&LogEntry::record(Category::Auth, ["login ok"]))
            .unwrap();

        let auth = store
            .read(Category::Auth, 10, None, ReadOrder::Chronological)
            .unwrap();
        assert_eq!(messages(&auth), vec!["login ok"]);
        assert!(store
            .read(Category::Db, 10, None, ReadOrder::Chronological)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_cutoff_excludes_later_records() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, 1024 * 1024, 64 * 1024);
        for n in 1..=4 {
            store.append(&event(n)).unwrap();
        }

        let entries = store
            .read(Category::Event, 10, Some(T0 + 2000), ReadOrder::Chronological)
            .unwrap();
        assert_eq!(messages(&entries), vec!["event #1", "event #2"]);
    }

    #[test]
    fn test_corrupt_record_is_skipped() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, 1024 * 1024, 64 * 1024);
        store.append(&event(1)).unwrap();

        let active = active_path(temp.path(), Category::Event);
        let mut file = OpenOptions::new().append(true).open(&active).unwrap();
        file.write_all(b"garbage without header\n\n").unwrap();
        drop(file);

        store.append(&event(2)).unwrap();

        let entries = store
            .read(Category::Event, 10, None, ReadOrder::Chronological)
            .unwrap();
        assert_eq!(messages(&entries), vec!["event #1", "event #2"]);
    }

    #[test]
    fn test_reset_retains_latest() {
        let temp = TempDir::new().unwrap();
        let len = record_len(&event(1));
        let store = open(&temp, 10 * len, 2 * len);
        for n in 1..=5 {
            store.append(&event(n)).unwrap();
        }

        let retained = store.reset(Category::Event, 2).unwrap();
        assert_eq!(messages(&retained), vec!["event #4", "event #5"]);
        assert!(list_generations(temp.path(), Category::Event)
            .unwrap()
            .is_empty());
        assert!(!scratch_path(temp.path(), Category::Event).exists());

        let entries = store
            .read(Category::Event, 10, None, ReadOrder::Chronological)
            .unwrap();
        assert_eq!(entries, retained);

        assert!(store.reset(Category::Event, 0).unwrap().is_empty());
        assert_eq!(store.total_size(Category::Event).unwrap(), 0);
    }

    #[test]
    fn test_reset_moves_retained_into_active_buffer() {
        let temp = TempDir::new().unwrap();
        let len = record_len(&event(1));
        let store = open(&temp, 10 * len, len);
        for n in 1..=4 {
            store.append(&event(n)).unwrap();
        }
        assert_eq!(list_generations(temp.path(), Category::Event).unwrap().len(), 3);

        store.reset(Category::Event, 3).unwrap();

        let active = fs::read_to_string(active_path(temp.path(), Category::Event)).unwrap();
        let kept: Vec<&str> = split_records(&active).collect();
        assert_eq!(kept.len(), 3);
        assert!(kept[0].contains("event #2"));
        assert!(kept[2].contains("event #4"));
        assert!(list_generations(temp.path(), Category::Event)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_open_rejects_inconsistent_policy() {
        let temp = TempDir::new().unwrap();
        let result = LocalStore::open(
            temp.path(),
            RotationPolicy {
                max_bytes: 1024,
                rollover_bytes: 4096,
            },
        );
        assert!(matches!(
            result,
            Err(LocalStoreError::InvalidPolicy {
                rollover: 4096,
                max: 1024
            })
        ));

        let result = LocalStore::open(
            temp.path(),
            RotationPolicy {
                max_bytes: 1024,
                rollover_bytes: 0,
            },
        );
        assert!(matches!(result, Err(LocalStoreError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_raw_concatenates_oldest_first() {
        let temp = TempDir::new().unwrap();
        let len = record_len(&event(1));
        let store = open(&temp, 10 * len, len);
        for n in 1..=3 {
            store.append(&event(n)).unwrap();
        }

        let raw = store.raw(Category::Event).unwrap();
        let first = raw.find("event #1").unwrap();
        let third = raw.find("event #3").unwrap();
        assert!(first < third);
        assert_eq!(split_records(&raw).count(), 3);
    }

    #[test]
    fn test_concurrent_appends_same_category() {
        let temp = TempDir::new().unwrap();
        let store = std::sync::Arc::new(open(&temp, 1024 * 1024, 64 * 1024));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for n in 0..25 {
                        store.append(&event(t * 100 + n)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = store
            .read(Category::Event, 1000, None, ReadOrder::Chronological)
            .unwrap();
        assert_eq!(entries.len(), 100);
    }
}
