use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "CIRCLELOG_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/circlelog.toml";
const ENV_PREFIX: &str = "CIRCLELOG";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // CIRCLELOG__CATEGORIES__DB=false -> categories.db
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert!(config.local.enabled);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"

[local]
dir = "/var/lib/circlelog/local"
max_size = "20MB"
rollover_size = "2MB"

[archive]
provider = "memory"
prefix = "prod-logs"

[categories]
db = false

[dedup]
window = "5m"
confidence = 0.8

[search]
lookback = "3d"
timeout = "10s"
max_parallel_connections = 4

[partitions]
refresh_interval = "6h"
table = "community_logs"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.local.max_size.as_u64(), 20 * 1024 * 1024);
        assert_eq!(config.local.rollover_size.as_u64(), 2 * 1024 * 1024);
        assert_eq!(config.archive.prefix, "prod-logs");
        assert!(!config.categories.db);
        assert!(config.categories.alert);
        assert_eq!(config.dedup.window.as_duration(), Duration::from_secs(300));
        assert_eq!(config.dedup.confidence, 0.8);
        assert_eq!(config.search.lookback.as_duration(), Duration::from_secs(3 * 86_400));
        assert_eq!(config.search.max_parallel_connections, 4);
        assert_eq!(config.search.default_max_entries, 100);
        assert_eq!(
            config.partitions.refresh_interval.as_duration(),
            Duration::from_secs(6 * 3600)
        );
        assert_eq!(config.partitions.table, "community_logs");
        assert_eq!(config.partitions.database, "community");
    }

    // Environment overrides are not exercised here: mutating process env in
    // parallel tests is unsafe.
}
