//! Tracing setup and the sink-failure channel
//!
//! Sink failures never go back into the logbook they came from: they are
//! reported here, logged under the `circlelog::failures` target and counted
//! per sink.

use serde::Serialize;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

use crate::entry::Category;

/// Install the global tracing subscriber (`RUST_LOG` wins over `default_filter`)
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Which part of the pipeline failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Local,
    Archive,
    Search,
    Validation,
}

impl Sink {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sink::Local => "local",
            Sink::Archive => "archive",
            Sink::Search => "search",
            Sink::Validation => "validation",
        }
    }
}

/// Failure reporting channel shared by every sink
#[derive(Debug, Default)]
pub struct FailureChannel {
    local: AtomicU64,
    archive: AtomicU64,
    search: AtomicU64,
    validation: AtomicU64,
}

impl FailureChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, sink: Sink, category: Option<Category>, error: &dyn Display) {
        self.counter(sink).fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            target: "circlelog::failures",
            sink = sink.as_str(),
            category = category.map(|c| c.as_str()).unwrap_or("-"),
            error = %error,
            "Sink operation failed"
        );
    }

    pub fn snapshot(&self) -> FailureSnapshot {
        FailureSnapshot {
            local: self.local.load(Ordering::Relaxed),
            archive: self.archive.load(Ordering::Relaxed),
            search: self.search.load(Ordering::Relaxed),
            validation: self.validation.load(Ordering::Relaxed),
        }
    }

    fn counter(&self, sink: Sink) -> &AtomicU64 {
        match sink {
            Sink::Local => &self.local,
            Sink::Archive => &self.archive,
            Sink::Search => &self.search,
            Sink::Validation => &self.validation,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureSnapshot {
    pub local: u64,
    pub archive: u64,
    pub search: u64,
    pub validation: u64,
}

impl FailureSnapshot {
    pub fn total(&self) -> u64 {
        self.local + self.archive + self.search + self.validation
    }
}
