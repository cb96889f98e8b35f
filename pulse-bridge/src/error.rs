//! Bridge error types.
//!
//! Every failure mode has a named variant. None of them reach the end
//! user: the assistant converts them all into the deterministic
//! fallback answer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("model endpoint unhealthy: {0}")]
    Unhealthy(String),

    #[error("model transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model reply was empty")]
    EmptyReply,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
