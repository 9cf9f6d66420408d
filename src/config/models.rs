use crate::entry::{Category, MergePolicy};
use crate::humanize::{ByteSize, HumanDuration};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub categories: CategoryToggles,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub partitions: PartitionConfig,
}

/// Read API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_concurrent_requests() -> usize {
    64
}

fn enabled() -> bool {
    true
}

/// Local rotating buffer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_local_dir")]
    pub dir: PathBuf,
    /// Upper bound for all generations of one category
    #[serde(default = "default_max_size")]
    pub max_size: ByteSize,
    /// Active buffer size that triggers rotation
    #[serde(default = "default_rollover_size")]
    pub rollover_size: ByteSize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_local_dir(),
            max_size: default_max_size(),
            rollover_size: default_rollover_size(),
        }
    }
}

fn default_local_dir() -> PathBuf {
    PathBuf::from("data/local")
}

fn default_max_size() -> ByteSize {
    ByteSize(10 * 1024 * 1024) // 10 MB
}

fn default_rollover_size() -> ByteSize {
    ByteSize(1024 * 1024) // 1 MB
}

/// Object store backend for the archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveProvider {
    Memory,
    #[default]
    Local,
}

/// Durable archive configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub provider: ArchiveProvider,
    /// Filesystem root for the `local` provider
    #[serde(default = "default_archive_root")]
    pub root: PathBuf,
    /// Key prefix all archived objects live under
    #[serde(default = "default_archive_prefix")]
    pub prefix: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: ArchiveProvider::default(),
            root: default_archive_root(),
            prefix: default_archive_prefix(),
        }
    }
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("data/archive")
}

fn default_archive_prefix() -> String {
    "logs".to_string()
}

/// Per-category enable flags
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryToggles {
    #[serde(default = "enabled")]
    pub error: bool,
    #[serde(default = "enabled")]
    pub warn: bool,
    #[serde(default = "enabled")]
    pub event: bool,
    #[serde(default = "enabled")]
    pub auth: bool,
    #[serde(default = "enabled")]
    pub db: bool,
    #[serde(default = "enabled")]
    pub alert: bool,
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            error: true,
            warn: true,
            event: true,
            auth: true,
            db: true,
            alert: true,
        }
    }
}

impl CategoryToggles {
    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Error => self.error,
            Category::Warn => self.warn,
            Category::Event => self.event,
            Category::Auth => self.auth,
            Category::Db => self.db,
            Category::Alert => self.alert,
        }
    }
}

/// Duplicate detection tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_window")]
    pub window: HumanDuration,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Tolerance when checking a payload against the key it was stored under
    #[serde(default = "default_similarity_window")]
    pub similarity_window: HumanDuration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window: default_dedup_window(),
            confidence: default_confidence(),
            similarity_window: default_similarity_window(),
        }
    }
}

impl DedupConfig {
    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy {
            window: self.window.as_duration(),
            confidence: self.confidence,
        }
    }
}

fn default_dedup_window() -> HumanDuration {
    HumanDuration::from_secs(10 * 60)
}

fn default_confidence() -> f64 {
    0.5
}

fn default_similarity_window() -> HumanDuration {
    HumanDuration::from_secs(1)
}

/// Search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Window used when a search omits its start
    #[serde(default = "default_lookback")]
    pub lookback: HumanDuration,
    #[serde(default = "default_max_entries")]
    pub default_max_entries: usize,
    #[serde(default = "max_entries_cap")]
    pub max_entries: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout: HumanDuration,
    #[serde(default = "default_max_parallel_connections")]
    pub max_parallel_connections: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            lookback: default_lookback(),
            default_max_entries: default_max_entries(),
            max_entries: max_entries_cap(),
            timeout: default_search_timeout(),
            max_parallel_connections: default_max_parallel_connections(),
        }
    }
}

fn default_lookback() -> HumanDuration {
    HumanDuration::from_secs(7 * 86_400)
}

fn default_max_entries() -> usize {
    100
}

fn max_entries_cap() -> usize {
    1000
}

fn default_search_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_max_parallel_connections() -> usize {
    8
}

/// Query-engine partition metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PartitionConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: HumanDuration,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// Fjall keyspace holding the partition catalog
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            database: default_database(),
            table: default_table(),
            catalog_path: default_catalog_path(),
        }
    }
}

fn default_refresh_interval() -> HumanDuration {
    HumanDuration::from_secs(12 * 3600)
}

fn default_database() -> String {
    "community".to_string()
}

fn default_table() -> String {
    "logs".to_string()
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("data/catalog")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.local.max_size.as_u64(), 10 * 1024 * 1024);
        assert_eq!(config.local.rollover_size.as_u64(), 1024 * 1024);
        assert_eq!(config.archive.provider, ArchiveProvider::Local);
        assert_eq!(config.search.lookback.as_duration(), Duration::from_secs(7 * 86_400));
        assert_eq!(
            config.partitions.refresh_interval.as_duration(),
            Duration::from_secs(12 * 3600)
        );
        assert!(Category::ALL.iter().all(|c| config.categories.is_enabled(*c)));
    }

    #[test]
    fn test_merge_policy_from_dedup() {
        let dedup = DedupConfig {
            window: HumanDuration::from_secs(120),
            confidence: 0.25,
            similarity_window: HumanDuration::from_secs(1),
        };
        let policy = dedup.merge_policy();
        assert_eq!(policy.window, Duration::from_secs(120));
        assert_eq!(policy.confidence, 0.25);
    }

    #[test]
    fn test_toggles() {
        let toggles = CategoryToggles {
            db: false,
            ..CategoryToggles::default()
        };
        assert!(!toggles.is_enabled(Category::Db));
        assert!(toggles.is_enabled(Category::Auth));
    }
}
