use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::builder::TableRef;
use super::engine::QueryEngine;

/// What [`PartitionSync::ensure_partitions`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Refreshed within the interval; nothing to do
    Fresh,
    /// This caller refreshed; carries the number of new partitions
    Refreshed(usize),
    /// Another caller is refreshing; proceed with current metadata
    InFlight,
    /// Refresh failed; results may miss recent partitions
    Failed,
}

impl SyncOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SyncOutcome::Failed)
    }
}

/// Throttled, single-flight partition refresh shared by every search
pub struct PartitionSync {
    engine: Arc<dyn QueryEngine>,
    table: TableRef,
    interval: Duration,
    last_refresh: Mutex<Option<Instant>>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag even if the refreshing future is dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PartitionSync {
    pub fn new(engine: Arc<dyn QueryEngine>, table: TableRef, interval: Duration) -> Self {
        Self {
            engine,
            table,
            interval,
            last_refresh: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        *self
            .last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self) -> bool {
        self.last_refresh()
            .is_some_and(|at| at.elapsed() < self.interval)
    }

    /// Refresh partition metadata unless it is fresh or already being refreshed.
    ///
    /// A failed refresh leaves the last-refresh instant untouched so the next
    /// search tries again.
    pub async fn ensure_partitions(&self) -> SyncOutcome {
        if self.is_fresh() {
            return SyncOutcome::Fresh;
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Partition refresh already in flight");
            return SyncOutcome::InFlight;
        }
        let _guard = InFlightGuard(&self.in_flight);

        // another caller may have finished between the check and the swap
        if self.is_fresh() {
            return SyncOutcome::Fresh;
        }

        match self.engine.refresh_partitions(&self.table).await {
            Ok(added) => {
                *self
                    .last_refresh
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
                SyncOutcome::Refreshed(added)
            }
            Err(err) => {
                tracing::warn!(
                    table = %self.table.qualified(),
                    error = %err,
                    "Partition refresh failed"
                );
                SyncOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::builder::ScoredQuery;
    use crate::query::engine::ScoredRow;
    use crate::query::error::{QueryError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingEngine {
        refreshes: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingEngine {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                refreshes: AtomicUsize::new(0),
                delay,
                fail,
            })
        }

        fn refreshes(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryEngine for CountingEngine {
        async fn refresh_partitions(&self, _table: &TableRef) -> Result<usize> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(QueryError::Timeout(self.delay));
            }
            Ok(2)
        }

        async fn execute_scored_query(
            &self,
            _query: &ScoredQuery,
            _timeout: Duration,
        ) -> Result<Vec<ScoredRow>> {
            Ok(Vec::new())
        }
    }

    fn partition_sync(engine: Arc<CountingEngine>, interval: Duration) -> PartitionSync {
        PartitionSync::new(engine, TableRef::new("community", "logs"), interval)
    }

    #[tokio::test]
    async fn test_refresh_is_throttled() {
        let engine = CountingEngine::new(Duration::ZERO, false);
        let sync = partition_sync(engine.clone(), Duration::from_secs(3600));

        assert_eq!(sync.ensure_partitions().await, SyncOutcome::Refreshed(2));
        assert_eq!(sync.ensure_partitions().await, SyncOutcome::Fresh);
        assert_eq!(engine.refreshes(), 1);
        assert!(sync.last_refresh().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_callers_refresh_once() {
        let engine = CountingEngine::new(Duration::from_millis(100), false);
        let sync = partition_sync(engine.clone(), Duration::from_secs(3600));

        let (a, b) = tokio::join!(sync.ensure_partitions(), sync.ensure_partitions());
        let mut outcomes = vec![a, b];
        outcomes.sort_by_key(|o| matches!(o, SyncOutcome::InFlight));
        assert_eq!(outcomes, vec![SyncOutcome::Refreshed(2), SyncOutcome::InFlight]);
        assert_eq!(engine.refreshes(), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_advance_clock() {
        let engine = CountingEngine::new(Duration::ZERO, true);
        let sync = partition_sync(engine.clone(), Duration::from_secs(3600));

        assert_eq!(sync.ensure_partitions().await, SyncOutcome::Failed);
        assert!(sync.ensure_partitions().await.is_degraded());
        assert_eq!(engine.refreshes(), 2);
        assert!(sync.last_refresh().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_refresh_releases_flag() {
        let engine = CountingEngine::new(Duration::from_secs(60), false);
        let sync = partition_sync(engine.clone(), Duration::from_secs(3600));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), sync.ensure_partitions()).await;
        assert!(cancelled.is_err());

        let retried =
            tokio::time::timeout(Duration::from_millis(10), sync.ensure_partitions()).await;
        assert!(retried.is_err());
        assert_eq!(engine.refreshes(), 2);
    }

    #[tokio::test]
    async fn test_zero_interval_always_refreshes() {
        let engine = CountingEngine::new(Duration::ZERO, false);
        let sync = partition_sync(engine.clone(), Duration::ZERO);

        sync.ensure_partitions().await;
        sync.ensure_partitions().await;
        assert_eq!(engine.refreshes(), 2);
    }
}
