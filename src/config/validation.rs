use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("local.rollover_size ({rollover}) exceeds local.max_size ({max})")]
    RolloverExceedsMax { rollover: u64, max: u64 },

    #[error("dedup.confidence must be within [0, 1], got {0}")]
    InvalidConfidence(f64),

    #[error("search.default_max_entries ({default}) exceeds search.max_entries ({max})")]
    DefaultEntriesExceedMax { default: usize, max: usize },

    #[error("{field} must not be empty")]
    EmptyName { field: &'static str },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_local(config)?;
    validate_dedup(config)?;
    validate_search(config)?;
    validate_partitions(config)?;
    Ok(())
}

fn non_zero(value: u128, field: &'static str) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::ZeroValue { field });
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    non_zero(
        config.server.max_concurrent_requests as u128,
        "server.max_concurrent_requests",
    )
}

/// Rotation needs room for at least one full active buffer
fn validate_local(config: &Config) -> Result<(), ValidationError> {
    let local = &config.local;
    non_zero(local.max_size.as_u64() as u128, "local.max_size")?;
    non_zero(local.rollover_size.as_u64() as u128, "local.rollover_size")?;

    if local.rollover_size > local.max_size {
        return Err(ValidationError::RolloverExceedsMax {
            rollover: local.rollover_size.as_u64(),
            max: local.max_size.as_u64(),
        });
    }

    Ok(())
}

fn validate_dedup(config: &Config) -> Result<(), ValidationError> {
    let dedup = &config.dedup;
    non_zero(dedup.window.as_duration().as_millis(), "dedup.window")?;

    if !(0.0..=1.0).contains(&dedup.confidence) {
        return Err(ValidationError::InvalidConfidence(dedup.confidence));
    }

    Ok(())
}

fn validate_search(config: &Config) -> Result<(), ValidationError> {
    let search = &config.search;
    non_zero(search.lookback.as_duration().as_millis(), "search.lookback")?;
    non_zero(search.timeout.as_duration().as_millis(), "search.timeout")?;
    non_zero(search.max_entries as u128, "search.max_entries")?;
    non_zero(search.default_max_entries as u128, "search.default_max_entries")?;
    non_zero(
        search.max_parallel_connections as u128,
        "search.max_parallel_connections",
    )?;

    if search.default_max_entries > search.max_entries {
        return Err(ValidationError::DefaultEntriesExceedMax {
            default: search.default_max_entries,
            max: search.max_entries,
        });
    }

    Ok(())
}

fn validate_partitions(config: &Config) -> Result<(), ValidationError> {
    if config.partitions.database.trim().is_empty() {
        return Err(ValidationError::EmptyName {
            field: "partitions.database",
        });
    }
    if config.partitions.table.trim().is_empty() {
        return Err(ValidationError::EmptyName {
            field: "partitions.table",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::{ByteSize, HumanDuration};

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rollover_larger_than_max() {
        let mut config = Config::default();
        config.local.rollover_size = ByteSize(2048);
        config.local.max_size = ByteSize(1024);

        assert_eq!(
            validate(&config),
            Err(ValidationError::RolloverExceedsMax {
                rollover: 2048,
                max: 1024
            })
        );
    }

    #[test]
    fn test_zero_sizes() {
        let mut config = Config::default();
        config.local.rollover_size = ByteSize(0);

        assert_eq!(
            validate(&config),
            Err(ValidationError::ZeroValue {
                field: "local.rollover_size"
            })
        );
    }

    #[test]
    fn test_confidence_range() {
        let mut config = Config::default();
        config.dedup.confidence = 1.5;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidConfidence(_))
        ));

        config.dedup.confidence = f64::NAN;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidConfidence(_))
        ));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.search.timeout = HumanDuration::from_secs(0);
        assert_eq!(
            validate(&config),
            Err(ValidationError::ZeroValue {
                field: "search.timeout"
            })
        );
    }

    #[test]
    fn test_default_entries_above_cap() {
        let mut config = Config::default();
        config.search.default_max_entries = 5000;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::DefaultEntriesExceedMax { .. })
        ));
    }

    #[test]
    fn test_empty_table_name() {
        let mut config = Config::default();
        config.partitions.table = "  ".into();
        assert_eq!(
            validate(&config),
            Err(ValidationError::EmptyName {
                field: "partitions.table"
            })
        );
    }
}
