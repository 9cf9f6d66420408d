use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record of {size} bytes exceeds rollover threshold of {limit} bytes")]
    RecordTooLarge { size: u64, limit: u64 },

    #[error("Invalid rotation policy: rollover {rollover} bytes, max {max} bytes")]
    InvalidPolicy { rollover: u64, max: u64 },
}

pub type Result<T> = std::result::Result<T, LocalStoreError>;
