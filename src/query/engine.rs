use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;

use crate::archive::ArchiveStore;
use crate::entry::now_millis;

use super::builder::{ScoredQuery, TableRef};
use super::catalog::PartitionCatalog;
use super::error::{QueryError, Result};

/// One ranked row: the raw structured payload plus its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub score: u32,
    pub timestamp: i64,
    pub payload: Bytes,
}

/// Engine that scans the archive on the search path's behalf
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Bring the engine's partition metadata up to date; returns newly seen partitions
    async fn refresh_partitions(&self, table: &TableRef) -> Result<usize>;

    /// Run a scored query, failing with [`QueryError::Timeout`] past `timeout`
    async fn execute_scored_query(
        &self,
        query: &ScoredQuery,
        timeout: Duration,
    ) -> Result<Vec<ScoredRow>>;
}

/// Columns read from each payload before full decoding
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Columns {
    timestamp: i64,
    #[serde(default)]
    search_text: String,
}

/// In-process engine: a fjall partition catalog over the archive's objects
#[derive(Clone)]
pub struct CatalogEngine {
    catalog: PartitionCatalog,
    archive: ArchiveStore,
}

impl CatalogEngine {
    pub fn new(catalog: PartitionCatalog, archive: ArchiveStore) -> Self {
        Self { catalog, archive }
    }

    pub fn catalog(&self) -> &PartitionCatalog {
        &self.catalog
    }

    async fn scan(&self, query: &ScoredQuery) -> Result<Vec<ScoredRow>> {
        let days: Vec<_> = self
            .catalog
            .partitions(&query.table)?
            .into_iter()
            .filter(|day| query.partitions.matches(day))
            .collect();

        let mut keys = Vec::new();
        for day in &days {
            let listed = self.archive.list_day(day).await?;
            keys.extend(
                listed
                    .into_iter()
                    .filter(|(_, parts)| query.in_window(parts.timestamp))
                    .map(|(key, _)| key),
            );
        }

        tracing::debug!(
            partitions = days.len(),
            candidates = keys.len(),
            "Scanning catalogued partitions"
        );

        let archive = &self.archive;
        let fetched: Vec<_> = futures::stream::iter(keys)
            .map(|key| async move { (archive.get_payload(&key).await, key) })
            .buffer_unordered(archive.max_parallel())
            .collect()
            .await;

        let mut rows = Vec::new();
        for (result, key) in fetched {
            let payload = match result {
                Ok(payload) => payload,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err.into()),
            };

            // unreadable columns score as null and drop out like a non-match
            let Ok(columns) = serde_json::from_slice::<Columns>(&payload) else {
                tracing::debug!(key = %key, "Row without readable columns");
                continue;
            };

            let score = query.plan.score(&columns.search_text);
            if score > 0 && query.in_window(columns.timestamp) {
                rows.push(ScoredRow {
                    score,
                    timestamp: columns.timestamp,
                    payload,
                });
            }
        }

        rows.sort_by(|a, b| b.score.cmp(&a.score).then(b.timestamp.cmp(&a.timestamp)));
        rows.truncate(query.limit);
        Ok(rows)
    }
}

#[async_trait]
impl QueryEngine for CatalogEngine {
    async fn refresh_partitions(&self, table: &TableRef) -> Result<usize> {
        let now = now_millis();
        let mut added = 0;
        for day in self.archive.list_partitions().await? {
            if self.catalog.register(table, &day, now)? {
                added += 1;
            }
        }
        self.catalog.persist()?;

        tracing::info!(table = %table.qualified(), added, "Refreshed partitions");
        Ok(added)
    }

    async fn execute_scored_query(
        &self,
        query: &ScoredQuery,
        timeout: Duration,
    ) -> Result<Vec<ScoredRow>> {
        tokio::time::timeout(timeout, self.scan(query))
            .await
            .map_err(|_| QueryError::Timeout(timeout))?
    }
}
