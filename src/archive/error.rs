use thiserror::Error;

use crate::entry::{DecodeError, EntryError};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive object not found: {0}")]
    NotFound(String),

    #[error("Failed to decode archive object {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: DecodeError,
    },

    #[error("Payload stored under {key} does not match its key")]
    KeyMismatch { key: String },

    #[error("Entry timestamp {0} cannot be placed in a calendar partition")]
    Unkeyable(i64),

    #[error("Failed to encode entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
