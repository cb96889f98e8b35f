//! Pipeline error types.
//!
//! Input and parse failures abort a batch; per-row problems never do —
//! they are collected as `RowError` values on the batch instead.

use thiserror::Error;

use crate::canonical::BatchStatus;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file type: '{0}' (expected .csv or .json)")]
    UnsupportedType(String),

    #[error("JSON payload must be a top-level array of objects")]
    NotAnArray,

    #[error("invalid batch transition: {from:?} -> {to:?}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },

    #[error("CSV header error: {0}")]
    CsvHeader(#[from] csv::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown user partition: {0}")]
    UnknownUser(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
