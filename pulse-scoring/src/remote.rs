//! HTTP client for the remote scoring service.
//!
//! `POST {base}/api/process-customers` with the batch; the service
//! replies with a `{success, message, data}` envelope whose `data`
//! carries the same `ScoringOutcome` shape the fallback produces.
//! Every failure mode — transport error, non-2xx status, `success:
//! false`, missing `data` — surfaces as a `ScoringError` so the engine
//! can substitute the fallback.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ScoringError, ScoringResult};
use crate::thresholds::SCORING_TIMEOUT_SECS;
use crate::types::{CustomerInput, ScoringOutcome};

/// Request body for the process-customers endpoint.
#[derive(Serialize)]
struct ProcessRequest<'a> {
    user_id: &'a str,
    customers: &'a [CustomerInput],
}

/// Response envelope from the scoring service.
#[derive(Deserialize)]
struct ProcessResponse {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<ScoringOutcome>,
}

/// Client for the remote scoring service.
pub struct RemoteScoringClient {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteScoringClient {
    /// Create a client against the given base URL. The request timeout
    /// bounds the whole call; a slow service is treated as down.
    pub fn new(base_url: impl Into<String>) -> ScoringResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SCORING_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a batch for scoring.
    pub async fn process_customers(
        &self,
        user_id: &str,
        customers: &[CustomerInput],
    ) -> ScoringResult<ScoringOutcome> {
        let url = format!("{}/api/process-customers", self.base_url);
        let body = ProcessRequest { user_id, customers };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let envelope: ProcessResponse = response.json().await?;
        if !envelope.success {
            return Err(ScoringError::Rejected(envelope.message));
        }
        envelope.data.ok_or(ScoringError::MissingData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = RemoteScoringClient::new("http://scoring.local/").unwrap();
        assert_eq!(client.base_url(), "http://scoring.local");
    }

    #[test]
    fn unsuccessful_envelope_is_rejected() {
        let json = r#"{"success": false, "message": "No customer rows supplied"}"#;
        let envelope: ProcessResponse = serde_json::from_str(json).unwrap();
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn envelope_with_data_parses() {
        let json = r#"{
            "success": true,
            "message": "Processed successfully",
            "data": {
                "segments": [],
                "churn_predictions": [],
                "upsell_opportunities": [],
                "insights": {}
            }
        }"#;
        let envelope: ProcessResponse = serde_json::from_str(json).unwrap();
        assert!(envelope.success);
        assert!(envelope.data.is_some());
    }
}
