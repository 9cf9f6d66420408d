use std::collections::HashMap;
use std::time::Duration;

use super::{Category, LogEntry};

/// Tuning for [`merge_duplicates`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergePolicy {
    /// Largest timestamp gap two duplicates may have
    pub window: Duration,
    /// Minimum proximity `1 - gap / window` required to fold, in `[0, 1]`
    pub confidence: f64,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(10 * 60),
            confidence: 0.5,
        }
    }
}

impl MergePolicy {
    /// Whether two timestamps are close enough to be the same event
    pub fn accepts(&self, a: i64, b: i64) -> bool {
        let gap = a.abs_diff(b);
        let window = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);
        if window == 0 {
            return gap == 0;
        }
        if gap > window {
            return false;
        }
        1.0 - (gap as f64 / window as f64) >= self.confidence
    }
}

/// Fold near-identical entries into one representative each.
///
/// Entries group when category and `search_text` match exactly and their
/// timestamps pass [`MergePolicy::accepts`] against the group's representative.
/// The representative is the earliest occurrence and keeps its own timestamp;
/// every folded entry is referenced from its `duplicates` list. The result is
/// ordered newest first. Running the merge on its own output changes nothing.
pub fn merge_duplicates(entries: Vec<LogEntry>, policy: &MergePolicy) -> Vec<LogEntry> {
    let mut ordered = entries;
    ordered.sort_by_key(|entry| entry.timestamp());

    let mut groups: Vec<LogEntry> = Vec::with_capacity(ordered.len());
    let mut latest: HashMap<(Category, String), usize> = HashMap::new();

    for entry in ordered {
        let key = (entry.category(), entry.search_text().to_string());
        match latest.get(&key) {
            Some(&idx) if policy.accepts(groups[idx].timestamp(), entry.timestamp()) => {
                groups[idx].absorb(entry);
            }
            _ => {
                latest.insert(key, groups.len());
                groups.push(entry);
            }
        }
    }

    groups.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::DuplicateRef;

    const T0: i64 = 1_714_557_600_000;

    fn entry(category: Category, message: &str, timestamp: i64) -> LogEntry {
        LogEntry::builder()
            .category(category)
            .messages(vec![message.to_string()])
            .timestamp(timestamp)
            .build()
    }

    fn snapshot(entries: &[LogEntry]) -> Vec<(LogEntry, Vec<DuplicateRef>)> {
        entries
            .iter()
            .map(|e| (e.clone(), e.duplicates().to_vec()))
            .collect()
    }

    #[test]
    fn test_connection_refused_scenario() {
        let mut a = entry(Category::Error, "Connection refused", T0);
        a.set_archive_key("key-a").unwrap();
        let mut b = entry(Category::Error, "Connection refused", T0 + 90_000);
        b.set_archive_key("key-b").unwrap();

        let merged = merge_duplicates(vec![b, a.clone()], &MergePolicy::default());

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0], a);
        assert_eq!(merged[0].timestamp(), T0);
        assert_eq!(
            merged[0].duplicates(),
            &[DuplicateRef {
                archive_key: Some("key-b".into()),
                timestamp: T0 + 90_000
            }]
        );
    }

    #[test]
    fn test_grouping_requires_category_and_text() {
        let entries = vec![
            entry(Category::Error, "Connection refused", T0 + 2),
            entry(Category::Warn, "Connection refused", T0 + 1),
            entry(Category::Error, "connection   refused!", T0),
        ];
        let merged = merge_duplicates(entries, &MergePolicy::default());
        assert_eq!(merged.len(), 3);
        assert!(merged.iter().all(|e| e.duplicates().is_empty()));
    }

    #[test]
    fn test_case_insensitive_text_groups() {
        let entries = vec![
            entry(Category::Event, "Circle Created", T0 + 1_000),
            entry(Category::Event, "circle created", T0),
        ];
        let merged = merge_duplicates(entries, &MergePolicy::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].messages(), &["circle created".to_string()]);
    }

    #[test]
    fn test_confidence_shrinks_window() {
        let policy = MergePolicy {
            window: Duration::from_secs(100),
            confidence: 0.5,
        };
        assert!(policy.accepts(T0, T0 + 50_000));
        assert!(!policy.accepts(T0, T0 + 50_001));
        assert!(!policy.accepts(T0, T0 + 150_000));

        let zero = MergePolicy {
            window: Duration::ZERO,
            confidence: 1.0,
        };
        assert!(zero.accepts(T0, T0));
        assert!(!zero.accepts(T0, T0 + 1));
    }

    #[test]
    fn test_output_newest_first() {
        let entries = vec![
            entry(Category::Event, "a", T0),
            entry(Category::Event, "b", T0 + 10),
            entry(Category::Event, "c", T0 + 5),
        ];
        let merged = merge_duplicates(entries, &MergePolicy::default());
        let stamps: Vec<i64> = merged.iter().map(|e| e.timestamp()).collect();
        assert_eq!(stamps, vec![T0 + 10, T0 + 5, T0]);
    }

    #[test]
    fn test_idempotent() {
        let policy = MergePolicy {
            window: Duration::from_secs(60),
            confidence: 0.0,
        };
        let entries = vec![
            entry(Category::Error, "timeout", T0 + 200_000),
            entry(Category::Error, "timeout", T0 + 150_000),
            entry(Category::Error, "timeout", T0 + 100_000),
            entry(Category::Error, "timeout", T0 + 30_000),
            entry(Category::Error, "timeout", T0),
            entry(Category::Db, "timeout", T0 + 10),
            entry(Category::Error, "other", T0 + 20),
        ];

        let once = merge_duplicates(entries, &policy);
        let twice = merge_duplicates(once.clone(), &policy);

        assert_eq!(snapshot(&once), snapshot(&twice));
        // T0 absorbs T0+30s; T0+100s starts a group absorbing T0+150s; T0+200s stands alone
        let timeouts: Vec<(i64, usize)> = once
            .iter()
            .filter(|e| e.category() == Category::Error && e.search_text() == "timeout")
            .map(|e| (e.timestamp(), e.duplicates().len()))
            .collect();
        assert_eq!(
            timeouts,
            vec![(T0 + 200_000, 0), (T0 + 100_000, 1), (T0, 1)]
        );
    }
}
