//! The logbook: one entry point per category plus the read paths
//!
//! Writing never fails loudly. Each category method returns `true` when every
//! enabled sink accepted the entry; sink failures go to the
//! [`FailureChannel`] and never back into the logbook itself.
//!
//! ```rust,ignore
//! let logbook = Logbook::from_config(&config)?;
//! logbook.event(["user 42 joined circle 7"]).await;
//! logbook.error(["payment provider unreachable", "attempt=3"]).await;
//! ```

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveStore};
use crate::config::{CategoryToggles, Config};
use crate::entry::{merge_duplicates, Category, LogEntry};
use crate::local::{LocalStore, LocalStoreError, ReadOrder, RotationPolicy};
use crate::observability::{FailureChannel, FailureSnapshot, Sink};
use crate::query::QueryError;
use crate::search::{SearchEngine, SearchRequest, SearchSettings};

#[derive(Debug, Error)]
pub enum LogbookError {
    #[error("Failed to open local buffer: {0}")]
    Local(#[from] LocalStoreError),

    #[error("Failed to open archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Failed to open search engine: {0}")]
    Search(#[from] QueryError),
}

/// Runtime policy, resolved once from [`Config`]
#[derive(Debug, Clone)]
pub struct Settings {
    pub categories: CategoryToggles,
    pub search: SearchSettings,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            categories: config.categories.clone(),
            search: SearchSettings::from(config),
        }
    }
}

pub struct Logbook {
    settings: Settings,
    local: Option<LocalStore>,
    archive: Option<ArchiveStore>,
    search: Option<SearchEngine>,
    failures: Arc<FailureChannel>,
}

impl Logbook {
    /// A logbook with no sinks; attach them with the `with_*` methods
    pub fn new(settings: Settings, failures: Arc<FailureChannel>) -> Self {
        Self {
            settings,
            local: None,
            archive: None,
            search: None,
            failures,
        }
    }

    /// Open every sink the configuration enables
    pub fn from_config(config: &Config) -> Result<Self, LogbookError> {
        let mut logbook = Self::new(Settings::from(config), Arc::new(FailureChannel::new()));

        if config.local.enabled {
            let store = LocalStore::open(&config.local.dir, RotationPolicy::from(&config.local))?;
            logbook = logbook.with_local(store);
        }

        if config.archive.enabled {
            let archive = ArchiveStore::from_config(config)?;
            let search = SearchEngine::from_config(config, archive.clone())?;
            logbook = logbook.with_archive(archive).with_search(search);
        }

        tracing::info!(
            local = logbook.local.is_some(),
            archive = logbook.archive.is_some(),
            search = logbook.search.is_some(),
            "Logbook ready"
        );
        Ok(logbook)
    }

    pub fn with_local(mut self, store: LocalStore) -> Self {
        self.local = Some(store);
        self
    }

    pub fn with_archive(mut self, archive: ArchiveStore) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_search(mut self, search: SearchEngine) -> Self {
        self.search = Some(search);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn local(&self) -> Option<&LocalStore> {
        self.local.as_ref()
    }

    pub fn archive(&self) -> Option<&ArchiveStore> {
        self.archive.as_ref()
    }

    pub fn search_engine(&self) -> Option<&SearchEngine> {
        self.search.as_ref()
    }

    pub fn failures(&self) -> FailureSnapshot {
        self.failures.snapshot()
    }

    #[track_caller]
    pub fn error<I, S>(&self, messages: I) -> impl Future<Output = bool> + '_
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = capture(Category::Error, messages, Location::caller());
        self.log(entry)
    }

    pub fn warn<I, S>(&self, messages: I) -> impl Future<Output = bool> + '_
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log(LogEntry::record(Category::Warn, messages))
    }

    pub fn event<I, S>(&self, messages: I) -> impl Future<Output = bool> + '_
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log(LogEntry::record(Category::Event, messages))
    }

    pub fn auth<I, S>(&self, messages: I) -> impl Future<Output = bool> + '_
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log(LogEntry::record(Category::Auth, messages))
    }

    pub fn db<I, S>(&self, messages: I) -> impl Future<Output = bool> + '_
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log(LogEntry::record(Category::Db, messages))
    }

    #[track_caller]
    pub fn alert<I, S>(&self, messages: I) -> impl Future<Output = bool> + '_
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = capture(Category::Alert, messages, Location::caller());
        self.log(entry)
    }

    /// Dispatch a prebuilt entry to every enabled sink
    pub async fn log(&self, mut entry: LogEntry) -> bool {
        let category = entry.category();
        if !self.settings.categories.is_enabled(category) {
            return true;
        }

        mirror(&entry);

        let violations = entry.validate();
        if !violations.is_empty() {
            self.failures.report(
                Sink::Validation,
                Some(category),
                &format!("invalid entry: {:?}", violations),
            );
            return false;
        }

        let mut accepted = true;

        if let Some(local) = &self.local {
            if let Err(err) = local.append(&entry) {
                self.failures.report(Sink::Local, Some(category), &err);
                accepted = false;
            }
        }

        if let Some(archive) = &self.archive {
            if let Err(err) = archive.upload(&mut entry).await {
                self.failures.report(Sink::Archive, Some(category), &err);
                accepted = false;
            }
        }

        accepted
    }

    /// Archived entry by key; `None` when missing, undecodable or the archive is off
    pub async fn fetch(&self, key: &str) -> Option<LogEntry> {
        let archive = self.archive.as_ref()?;
        match archive.fetch_by_key(key).await {
            Ok(entry) => Some(entry),
            Err(err @ ArchiveError::NotFound(_)) => {
                tracing::debug!(error = %err, "Archive fetch missed");
                None
            }
            Err(err @ (ArchiveError::Decode { .. } | ArchiveError::KeyMismatch { .. })) => {
                tracing::warn!(key, error = %err, "Archived entry failed to decode");
                None
            }
            Err(err) => {
                self.failures.report(Sink::Archive, None, &err);
                None
            }
        }
    }

    /// Ranked search; empty when the search path is off or degraded
    pub async fn search(&self, request: &SearchRequest) -> Vec<LogEntry> {
        let Some(search) = &self.search else {
            return Vec::new();
        };

        match search.search(request).await {
            Ok(entries) => entries,
            Err(err) => {
                self.failures
                    .report(Sink::Search, Some(request.category), &err);
                Vec::new()
            }
        }
    }

    /// Recent WARN and ERROR entries from the archive, merged, newest first
    pub async fn default_view(&self) -> Vec<LogEntry> {
        let Some(archive) = &self.archive else {
            return Vec::new();
        };

        let view = &self.settings.search;
        let (start, end) = view.window(None, None);
        let limit = view.default_max_entries;

        let (warnings, errors) = tokio::join!(
            archive.fetch_by_date_range(Category::Warn, start, end, limit),
            archive.fetch_by_date_range(Category::Error, start, end, limit),
        );

        let mut entries = Vec::new();
        for (category, result) in [(Category::Warn, warnings), (Category::Error, errors)] {
            match result {
                Ok(found) => entries.extend(found),
                Err(err) => self.failures.report(Sink::Archive, Some(category), &err),
            }
        }

        merge_duplicates(entries, &view.merge)
    }

    /// Local read-back; empty when the local buffer is off or unreadable
    pub fn read_local(
        &self,
        category: Category,
        max_entries: usize,
        before: Option<i64>,
        order: ReadOrder,
    ) -> Vec<LogEntry> {
        let Some(local) = &self.local else {
            return Vec::new();
        };
        local
            .read(category, max_entries, before, order)
            .unwrap_or_else(|err| {
                self.failures.report(Sink::Local, Some(category), &err);
                Vec::new()
            })
    }

    /// Truncate a category to its `retain_latest` newest records
    pub fn reset_local(&self, category: Category, retain_latest: usize) -> Vec<LogEntry> {
        let Some(local) = &self.local else {
            return Vec::new();
        };
        local.reset(category, retain_latest).unwrap_or_else(|err| {
            self.failures.report(Sink::Local, Some(category), &err);
            Vec::new()
        })
    }

    /// Full text of a category's buffer; `None` when the local buffer is off or unreadable
    pub fn download_local(&self, category: Category) -> Option<String> {
        let local = self.local.as_ref()?;
        match local.raw(category) {
            Ok(text) => Some(text),
            Err(err) => {
                self.failures.report(Sink::Local, Some(category), &err);
                None
            }
        }
    }
}

fn capture<I, S>(category: Category, messages: I, caller: &Location<'_>) -> LogEntry
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let frame = format!("{}:{}:{}", caller.file(), caller.line(), caller.column());
    LogEntry::builder()
        .category(category)
        .messages(messages.into_iter().map(Into::into).collect())
        .stack_trace(vec![frame])
        .build()
}

/// Echo an entry to tracing at the level its category implies
fn mirror(entry: &LogEntry) {
    let category = entry.category();
    let message = entry.messages().join(" | ");
    match category {
        Category::Error | Category::Alert => {
            tracing::error!(target: "circlelog::entries", category = %category, "{}", message)
        }
        Category::Warn => {
            tracing::warn!(target: "circlelog::entries", category = %category, "{}", message)
        }
        _ => tracing::info!(target: "circlelog::entries", category = %category, "{}", message),
    }
}
