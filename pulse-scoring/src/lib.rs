//! Customer scoring core.
//!
//! Two backends, one output shape:
//! - `RemoteScoringClient` delegates to the scoring service over HTTP.
//! - `FallbackModel` is the in-process rule model — deterministic,
//!   explainable, and always available.
//!
//! `ScoringEngine::score` tries backends in order and substitutes the
//! fallback on any failure, so callers never observe an error. Which
//! path served a request is visible only in the logs.

pub mod engine;
pub mod error;
pub mod fallback;
pub mod insights;
pub mod remote;
pub mod thresholds;
pub mod types;
mod util;

pub use engine::{FallbackModel, ScoreBackend, ScoringEngine};
pub use error::ScoringError;
pub use remote::RemoteScoringClient;
pub use types::{
    ChurnPrediction, CustomerInput, CustomerScores, Insights, RiskLevel, ScoringOutcome, Segment,
    SegmentSummary, UpsellOpportunity,
};
