use thiserror::Error;

use super::Violation;

/// Failure to turn a stored payload back into a [`LogEntry`](super::LogEntry)
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("malformed line: {0}")]
    MalformedLine(String),

    #[error("malformed archive key: {0}")]
    MalformedKey(String),

    #[error("record is empty")]
    Empty,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decoded entry is invalid: {0:?}")]
    Invalid(Vec<Violation>),
}

/// Errors raised when mutating an entry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("archive key already set to {existing}, refusing {attempted}")]
    ArchiveKeyAlreadySet { existing: String, attempted: String },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
