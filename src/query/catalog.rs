/// Fjall-backed partition catalog
///
/// Key layout in the `partitions` partition:
/// - `{database}.{table}|category=…/year=…/month=…/day=…` -> refresh time (epoch millis, decimal)
use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use crate::entry::PartitionDay;

use super::builder::TableRef;
use super::error::Result;

#[derive(Clone)]
pub struct PartitionCatalog {
    keyspace: Keyspace,
    partitions: PartitionHandle,
}

fn table_prefix(table: &TableRef) -> String {
    format!("{}.{}|", table.database, table.table)
}

fn encode_key(table: &TableRef, day: &PartitionDay) -> Vec<u8> {
    format!("{}{}", table_prefix(table), day).into_bytes()
}

fn decode_key(key: &[u8], prefix: &str) -> Option<PartitionDay> {
    let key = std::str::from_utf8(key).ok()?;
    key.strip_prefix(prefix)?.parse().ok()
}

impl PartitionCatalog {
    /// Open or create a catalog at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening partition catalog at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let partitions = keyspace.open_partition("partitions", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            partitions,
        })
    }

    /// Record a partition as known; returns `true` if it was not catalogued before
    pub fn register(&self, table: &TableRef, day: &PartitionDay, refreshed_at: i64) -> Result<bool> {
        let key = encode_key(table, day);
        let is_new = self.partitions.get(&key)?.is_none();
        self.partitions.insert(key, refreshed_at.to_string().into_bytes())?;
        if is_new {
            debug!(partition = %day, "Registered partition");
        }
        Ok(is_new)
    }

    /// Every catalogued partition of a table
    pub fn partitions(&self, table: &TableRef) -> Result<Vec<PartitionDay>> {
        let prefix = table_prefix(table);
        let mut days = Vec::new();
        for item in self.partitions.prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            if let Some(day) = decode_key(&key, &prefix) {
                days.push(day);
            }
        }
        Ok(days)
    }

    /// When a partition was last seen by a refresh
    pub fn refreshed_at(&self, table: &TableRef, day: &PartitionDay) -> Result<Option<i64>> {
        let value = self.partitions.get(encode_key(table, day))?;
        Ok(value.and_then(|v| std::str::from_utf8(&v).ok()?.parse().ok()))
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Category;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn day(category: Category, d: u32) -> PartitionDay {
        PartitionDay::new(category, NaiveDate::from_ymd_opt(2024, 5, d).unwrap())
    }

    #[test]
    fn test_register_and_list() {
        let temp = TempDir::new().unwrap();
        let catalog = PartitionCatalog::open(temp.path().join("catalog")).unwrap();
        let logs = TableRef::new("community", "logs");
        let other = TableRef::new("community", "audit");

        assert!(catalog.register(&logs, &day(Category::Db, 1), 10).unwrap());
        assert!(catalog.register(&logs, &day(Category::Db, 2), 10).unwrap());
        assert!(!catalog.register(&logs, &day(Category::Db, 1), 20).unwrap());
        assert!(catalog.register(&other, &day(Category::Auth, 1), 10).unwrap());

        let days = catalog.partitions(&logs).unwrap();
        assert_eq!(days, vec![day(Category::Db, 1), day(Category::Db, 2)]);
        assert_eq!(
            catalog.refreshed_at(&logs, &day(Category::Db, 1)).unwrap(),
            Some(20)
        );
        assert_eq!(
            catalog.refreshed_at(&logs, &day(Category::Db, 3)).unwrap(),
            None
        );
        catalog.persist().unwrap();
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog");
        let logs = TableRef::new("community", "logs");

        {
            let catalog = PartitionCatalog::open(&path).unwrap();
            catalog.register(&logs, &day(Category::Warn, 7), 1).unwrap();
            catalog.persist().unwrap();
        }

        let catalog = PartitionCatalog::open(&path).unwrap();
        assert_eq!(catalog.partitions(&logs).unwrap(), vec![day(Category::Warn, 7)]);
    }
}
