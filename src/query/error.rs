use std::time::Duration;
use thiserror::Error;

use crate::archive::ArchiveError;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Search term is empty")]
    EmptyTerm,

    #[error("Invalid time window: start {start} is after end {end}")]
    InvalidWindow { start: i64, end: i64 },

    #[error("Query limit must be greater than zero")]
    ZeroLimit,

    #[error("Invalid match pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Partition catalog error: {0}")]
    Catalog(#[from] fjall::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;
