// =============================================================================
// Market Data Fetcher — retrying JSON GET over an injectable transport
// =============================================================================
//
// Upstream market-data APIs rate-limit aggressively and block some regions.
// Every GET therefore goes through `Fetcher::fetch`, which:
//
//   1. Treats the configured non-fatal statuses (HTTP 451 by default) as an
//      empty JSON array, not an error.
//   2. Retries any other failure up to `max_retries` times, sleeping
//      `base_delay_ms + step_delay_ms * attempt` between attempts.
//   3. Optionally reroutes the first failed request through a CORS relay
//      mirror before continuing with direct retries.
//
// The HTTP layer sits behind the `Transport` trait so tests can drive the
// whole pipeline with a scripted fake.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::binance::rate_limit::RateLimitTracker;

// -----------------------------------------------------------------------------
// Transport
// -----------------------------------------------------------------------------

/// Raw HTTP response as seen by the fetcher.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// A minimal async HTTP GET.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> anyhow::Result<TransportResponse>;
}

/// Production transport backed by `reqwest`.
///
/// Response headers are fed into the shared [`RateLimitTracker`] so the
/// orchestrator can slow down before Binance starts returning 429s.
pub struct ReqwestTransport {
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, rate_limit: Arc<RateLimitTracker>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client, rate_limit })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> anyhow::Result<TransportResponse> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .with_context(|| format!("failed to read response body from {url}"))?;

        Ok(TransportResponse { status, body })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------------

/// Failure of a single upstream request, surfaced after the retry budget.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("upstream returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {cause}")]
    Transport { url: String, cause: String },

    #[error("invalid JSON from {url}: {cause}")]
    Decode { url: String, cause: String },
}

// -----------------------------------------------------------------------------
// Retry policy
// -----------------------------------------------------------------------------

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_step_delay_ms() -> u64 {
    500
}

fn default_non_fatal_statuses() -> Vec<u16> {
    vec![451]
}

/// Backoff and status handling for [`Fetcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (2 => 3 attempts in total).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Extra delay added per attempt index.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,

    /// Statuses answered with an empty result instead of an error.
    #[serde(default = "default_non_fatal_statuses")]
    pub non_fatal_statuses: Vec<u16>,

    /// Relay prefix; the target URL is appended percent-encoded.
    #[serde(default)]
    pub cors_relay: Option<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            step_delay_ms: default_step_delay_ms(),
            non_fatal_statuses: default_non_fatal_statuses(),
            cors_relay: None,
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms + self.step_delay_ms * u64::from(attempt))
    }

    pub fn is_non_fatal(&self, status: u16) -> bool {
        self.non_fatal_statuses.contains(&status)
    }

    fn relay_url(&self, url: &str) -> Option<String> {
        self.cors_relay.as_ref().map(|relay| {
            let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
            format!("{relay}{encoded}")
        })
    }
}

// -----------------------------------------------------------------------------
// Fetcher
// -----------------------------------------------------------------------------

/// Retrying JSON fetcher shared by every upstream call in a cycle.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// GET `url` and decode the body as JSON.
    ///
    /// Returns `Ok(Value::Array([]))` for non-fatal statuses; fails with the
    /// last error only after `max_retries + 1` attempts.
    #[instrument(skip(self), name = "fetcher::fetch")]
    pub async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        let mut attempt = 0;
        loop {
            let err = match self.attempt(url).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt == 0 {
                if let Some(relayed) = self.policy.relay_url(url) {
                    match self.attempt(&relayed).await {
                        Ok(value) => {
                            info!(url, "request served through CORS relay");
                            return Ok(value);
                        }
                        Err(relay_err) => {
                            debug!(url, error = %relay_err, "CORS relay attempt failed");
                        }
                    }
                }
            }

            if attempt >= self.policy.max_retries {
                warn!(url, attempts = attempt + 1, error = %err, "retry budget exhausted");
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt);
            debug!(url, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self
            .transport
            .get(url)
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                cause: format!("{e:#}"),
            })?;

        if self.policy.is_non_fatal(resp.status) {
            debug!(url, status = resp.status, "non-fatal status — returning empty result");
            return Ok(Value::Array(Vec::new()));
        }

        if !(200..300).contains(&resp.status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status,
            });
        }

        serde_json::from_str(&resp.body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            cause: e.to_string(),
        })
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").field("policy", &self.policy).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{json_response, status_response, zero_delay_policy, FakeTransport};
    use serde_json::json;

    #[test]
    fn delay_scales_with_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn returns_decoded_json() {
        let fake = FakeTransport::new(|_| json_response(json!({ "ok": true })));
        let fetcher = Fetcher::new(fake.clone(), zero_delay_policy());
        let value = fetcher.fetch("https://example.test/a").await.unwrap();
        assert_eq!(value, json!({ "ok": true }));
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test]
    async fn legally_blocked_is_empty_result() {
        let fake = FakeTransport::new(|_| status_response(451));
        let fetcher = Fetcher::new(fake.clone(), zero_delay_policy());
        let value = fetcher.fetch("https://example.test/klines").await.unwrap();
        assert_eq!(value, json!([]));
        assert_eq!(fake.calls().len(), 1, "451 must not be retried");
    }

    #[tokio::test]
    async fn server_error_exhausts_three_attempts() {
        let fake = FakeTransport::new(|_| status_response(500));
        let fetcher = Fetcher::new(fake.clone(), zero_delay_policy());
        let err = fetcher.fetch("https://example.test/x").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        assert_eq!(fake.calls().len(), 3);
    }

    #[tokio::test]
    async fn recovers_on_a_later_attempt() {
        let fake = FakeTransport::new(|_| status_response(429));
        fake.push_script(vec![status_response(429), json_response(json!([1, 2]))]);
        let fetcher = Fetcher::new(fake.clone(), zero_delay_policy());
        let value = fetcher.fetch("https://example.test/y").await.unwrap();
        assert_eq!(value, json!([1, 2]));
        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn transport_errors_are_retried_then_surfaced() {
        let fake = FakeTransport::new(|_| Err(anyhow::anyhow!("connection reset")));
        let fetcher = Fetcher::new(fake.clone(), zero_delay_policy());
        let err = fetcher.fetch("https://example.test/z").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(fake.calls().len(), 3);
    }

    #[tokio::test]
    async fn invalid_json_is_a_decode_error() {
        let fake = FakeTransport::new(|_| {
            Ok(TransportResponse {
                status: 200,
                body: "<html>".to_string(),
            })
        });
        let fetcher = Fetcher::new(fake, zero_delay_policy());
        let err = fetcher.fetch("https://example.test/html").await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn relay_is_tried_after_first_failure() {
        let fake = FakeTransport::new(|url| {
            if url.starts_with("https://relay.test/?url=") {
                json_response(json!({ "via": "relay" }))
            } else {
                status_response(403)
            }
        });
        let mut policy = zero_delay_policy();
        policy.cors_relay = Some("https://relay.test/?url=".to_string());
        let fetcher = Fetcher::new(fake.clone(), policy);

        let value = fetcher.fetch("https://api.test/v1?a=1&b=2").await.unwrap();
        assert_eq!(value, json!({ "via": "relay" }));

        let calls = fake.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], "https://relay.test/?url=https%3A%2F%2Fapi.test%2Fv1%3Fa%3D1%26b%3D2");
    }

    #[tokio::test]
    async fn relay_failure_falls_back_to_direct_retries() {
        let fake = FakeTransport::new(|_| status_response(503));
        let mut policy = zero_delay_policy();
        policy.cors_relay = Some("https://relay.test/?url=".to_string());
        let fetcher = Fetcher::new(fake.clone(), policy);

        assert!(fetcher.fetch("https://api.test/v1").await.is_err());
        // 3 direct attempts + 1 relay attempt
        assert_eq!(fake.calls().len(), 4);
    }
}
