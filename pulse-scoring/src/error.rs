//! Scoring error types.
//!
//! These never escape `ScoringEngine::score` — every variant routes to
//! the fallback model. They exist so the engine can log exactly why a
//! remote request was abandoned.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring service transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("scoring service rejected the batch: {0}")]
    Rejected(String),

    #[error("scoring service reply was missing the data payload")]
    MissingData,
}

/// Result type alias for scoring backends.
pub type ScoringResult<T> = Result<T, ScoringError>;
