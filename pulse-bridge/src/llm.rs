//! HTTP client for the language-model service.
//!
//! Generation is fully pinned down: temperature 0, low top-p, bounded
//! tokens — the model is a formatter here, not an oracle. A cached,
//! time-boxed health probe gates every generation attempt so an
//! unreachable endpoint costs one probe per TTL window instead of one
//! timeout per question.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// How long a health probe result stays valid.
pub const HEALTH_TTL: Duration = Duration::from_secs(30);
/// Budget for the health probe itself.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
/// Budget for one generation call.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Clone, Copy)]
struct HealthProbe {
    healthy: bool,
    checked_at: Instant,
}

/// Client for the model endpoint.
pub struct LlmClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    health: Mutex<Option<HealthProbe>>,
}

impl LlmClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> BridgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(GENERATE_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
            health: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cached health check. A fresh probe runs only when the cached
    /// result is older than `HEALTH_TTL`.
    pub async fn is_healthy(&self) -> bool {
        if let Some(probe) = *self.health.lock() {
            if probe.checked_at.elapsed() < HEALTH_TTL {
                return probe.healthy;
            }
        }
        let healthy = self.probe().await;
        *self.health.lock() = Some(HealthProbe {
            healthy,
            checked_at: Instant::now(),
        });
        if !healthy {
            log::warn!("model endpoint {} is unhealthy", self.base_url);
        }
        healthy
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// One deterministic generation call.
    pub async fn generate(&self, prompt: &str) -> BridgeResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: 0.0,
                top_p: 0.3,
                max_tokens: 512,
            },
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let reply: GenerateResponse = response.json().await?;
        if reply.response.trim().is_empty() {
            return Err(BridgeError::EmptyReply);
        }
        Ok(reply.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_contract() {
        let body = GenerateRequest {
            model: "llama3",
            prompt: "hi",
            stream: false,
            options: GenerateOptions {
                temperature: 0.0,
                top_p: 0.3,
                max_tokens: 512,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.0);
        assert_eq!(json["options"]["top_p"], 0.3);
        assert_eq!(json["options"]["max_tokens"], 512);
    }

    #[tokio::test]
    async fn unreachable_endpoint_reads_unhealthy_and_caches() {
        let client = LlmClient::new("http://127.0.0.1:1", "llama3").unwrap();
        assert!(!client.is_healthy().await);
        // Second call hits the cache; still unhealthy.
        assert!(!client.is_healthy().await);
    }
}
