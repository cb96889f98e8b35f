//! The scoring engine facade.
//!
//! Backends are tried in order; the first success wins. The fallback
//! model is always the last backend and never fails, so `score` is
//! infallible by construction — callers get a complete outcome whether
//! or not the remote service is reachable.

use async_trait::async_trait;
use chrono::Utc;

use crate::error::ScoringResult;
use crate::fallback;
use crate::remote::RemoteScoringClient;
use crate::types::{CustomerInput, ScoringOutcome};
use crate::util;

/// A scoring capability. The engine composes these; tests can swap in
/// their own.
#[async_trait]
pub trait ScoreBackend: Send + Sync {
    /// Score a batch of customers for one tenant.
    async fn score(
        &self,
        user_id: &str,
        customers: &[CustomerInput],
    ) -> ScoringResult<ScoringOutcome>;

    /// Returns a stable name for logging.
    fn name(&self) -> &str {
        util::short_type_name(std::any::type_name::<Self>())
    }
}

#[async_trait]
impl ScoreBackend for RemoteScoringClient {
    async fn score(
        &self,
        user_id: &str,
        customers: &[CustomerInput],
    ) -> ScoringResult<ScoringOutcome> {
        self.process_customers(user_id, customers).await
    }
}

/// The in-process rule model as a backend. Infallible.
pub struct FallbackModel;

#[async_trait]
impl ScoreBackend for FallbackModel {
    async fn score(
        &self,
        _user_id: &str,
        customers: &[CustomerInput],
    ) -> ScoringResult<ScoringOutcome> {
        Ok(fallback::score_batch(customers, Utc::now()))
    }
}

/// Scores customer batches, degrading transparently from the remote
/// service to the rule model.
pub struct ScoringEngine {
    backends: Vec<Box<dyn ScoreBackend>>,
}

impl ScoringEngine {
    /// Engine that only ever uses the in-process rule model.
    pub fn fallback_only() -> Self {
        Self {
            backends: vec![Box::new(FallbackModel)],
        }
    }

    /// Engine that prefers the remote service and degrades to the rule
    /// model on any failure.
    pub fn with_remote(remote: RemoteScoringClient) -> Self {
        Self {
            backends: vec![Box::new(remote), Box::new(FallbackModel)],
        }
    }

    /// Engine over an explicit backend chain (last entry should be
    /// infallible).
    pub fn with_backends(backends: Vec<Box<dyn ScoreBackend>>) -> Self {
        Self { backends }
    }

    /// Score a batch. Never fails: a backend error means the next
    /// backend serves the request, and the rule model is the floor.
    pub async fn score(&self, user_id: &str, customers: &[CustomerInput]) -> ScoringOutcome {
        for backend in &self.backends {
            match backend.score(user_id, customers).await {
                Ok(outcome) => {
                    log::debug!("scoring served by {}", backend.name());
                    return outcome;
                }
                Err(err) => {
                    log::warn!("{} failed ({err}); trying next backend", backend.name());
                }
            }
        }
        // Every configured backend failed; the rule model is the floor.
        fallback::score_batch(customers, Utc::now())
    }
}
