//! Relevance search over the archive
//!
//! A search resolves its time window, makes sure partition metadata is
//! reasonably fresh, runs a [`ScoredQuery`] on the [`QueryEngine`], decodes
//! the ranked rows and optionally folds duplicates together.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::archive::ArchiveStore;
use crate::config::Config;
use crate::entry::{decode_structured, merge_duplicates, Category, LogEntry, MergePolicy};
use crate::query::{
    CatalogEngine, PartitionCatalog, PartitionSync, QueryEngine, QueryError, Result, ScoreWeights,
    ScoredQuery, SyncOutcome, TableRef,
};

/// Message of the entry prepended when partition metadata could not be refreshed
pub const DEGRADED_NOTICE: &str = "partition refresh failed; results may be incomplete";

/// One search call
#[derive(Debug, Clone, bon::Builder)]
pub struct SearchRequest {
    pub category: Category,
    #[builder(into)]
    pub term: String,
    /// Defaults to `end` minus the configured lookback
    pub start: Option<DateTime<Utc>>,
    /// Defaults to now
    pub end: Option<DateTime<Utc>>,
    /// Defaults to the configured default, clamped to the configured maximum
    pub max_entries: Option<usize>,
    #[builder(default)]
    pub merge_duplicates: bool,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub lookback: Duration,
    pub default_max_entries: usize,
    pub max_entries: usize,
    pub timeout: Duration,
    pub merge: MergePolicy,
    pub weights: ScoreWeights,
}

impl From<&Config> for SearchSettings {
    fn from(config: &Config) -> Self {
        Self {
            lookback: config.search.lookback.as_duration(),
            default_max_entries: config.search.default_max_entries,
            max_entries: config.search.max_entries,
            timeout: config.search.timeout.as_duration(),
            merge: config.dedup.merge_policy(),
            weights: ScoreWeights::default(),
        }
    }
}

impl SearchSettings {
    /// Requested size, defaulted and clamped
    pub fn limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_entries)
            .min(self.max_entries)
    }

    /// `[start, end]` with both ends defaulted
    pub fn window(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = end.unwrap_or_else(Utc::now);
        let start = start.unwrap_or_else(|| {
            chrono::Duration::from_std(self.lookback)
                .ok()
                .and_then(|lookback| end.checked_sub_signed(lookback))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });
        (start, end)
    }
}

pub struct SearchEngine {
    engine: Arc<dyn QueryEngine>,
    sync: PartitionSync,
    settings: SearchSettings,
}

impl SearchEngine {
    pub fn new(engine: Arc<dyn QueryEngine>, sync: PartitionSync, settings: SearchSettings) -> Self {
        Self {
            engine,
            sync,
            settings,
        }
    }

    /// Catalog engine over `archive`, with its catalog at `partitions.catalog_path`
    pub fn from_config(config: &Config, archive: ArchiveStore) -> Result<Self> {
        let catalog = PartitionCatalog::open(&config.partitions.catalog_path)?;
        let engine: Arc<dyn QueryEngine> = Arc::new(CatalogEngine::new(catalog, archive));
        let sync = PartitionSync::new(
            engine.clone(),
            TableRef::from(&config.partitions),
            config.partitions.refresh_interval.as_duration(),
        );
        Ok(Self::new(engine, sync, SearchSettings::from(config)))
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn partition_sync(&self) -> &PartitionSync {
        &self.sync
    }

    /// Run a search under the configured hard timeout
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<LogEntry>> {
        let timeout = self.settings.timeout;
        tokio::time::timeout(timeout, self.run(request))
            .await
            .map_err(|_| QueryError::Timeout(timeout))?
    }

    async fn run(&self, request: &SearchRequest) -> Result<Vec<LogEntry>> {
        let (start, end) = self.settings.window(request.start, request.end);
        let limit = self.settings.limit(request.max_entries);

        if request.term.trim().is_empty() || start > end || limit == 0 {
            return Ok(Vec::new());
        }

        let outcome = self.sync.ensure_partitions().await;

        let query = ScoredQuery::builder()
            .table(self.sync.table().clone())
            .category(request.category)
            .start(start)
            .end(end)
            .term(request.term.as_str())
            .weights(self.settings.weights)
            .limit(limit)
            .build()?;

        let rows = self
            .engine
            .execute_scored_query(&query, self.settings.timeout)
            .await?;

        let total = rows.len();
        let mut discarded = 0usize;
        let mut entries = Vec::with_capacity(total);
        for row in rows {
            match decode_structured(&row.payload) {
                Ok(entry) if query.in_window(entry.timestamp()) => entries.push(entry),
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(error = %err, timestamp = row.timestamp, "Undecodable search row");
                    discarded += 1;
                }
            }
        }

        if discarded * 4 > total {
            tracing::warn!(
                category = %request.category,
                discarded,
                total,
                "More than a quarter of search rows failed to decode"
            );
        }

        if request.merge_duplicates {
            entries = merge_duplicates(entries, &self.settings.merge);
        }

        if outcome == SyncOutcome::Failed {
            entries.insert(0, LogEntry::record(Category::Warn, [DEGRADED_NOTICE]));
        }

        tracing::debug!(
            category = %request.category,
            returned = entries.len(),
            "Search completed"
        );
        Ok(entries)
    }
}
