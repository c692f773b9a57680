//! JSON-over-HTTP with retry and exponential backoff.
//!
//! Shared by the OpenAI / Ollama embedding providers and the chat-completion
//! generator:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;

/// A POST request to retry until it succeeds or `max_retries` is exhausted.
pub struct JsonPost<'a> {
    pub client: &'a reqwest::Client,
    pub url: String,
    pub bearer: Option<&'a str>,
    pub body: &'a serde_json::Value,
    pub max_retries: u32,
    /// Service name used in error messages (e.g. `"OpenAI"`).
    pub service: &'a str,
}

pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Upper bound on one [`JsonPost::send`]: every attempt at its full
/// request timeout plus every backoff sleep between attempts.
pub fn retry_budget(timeout_secs: u64, max_retries: u32) -> Duration {
    let attempts = Duration::from_secs(timeout_secs) * (max_retries + 1);
    (1..=max_retries).map(backoff).fold(attempts, |total, delay| total + delay)
}

impl JsonPost<'_> {
    pub async fn send(&self) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff(attempt);
                tracing::debug!(service = self.service, attempt, ?delay, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(&self.url)
                .header("Content-Type", "application/json")
                .json(self.body);
            if let Some(key) = self.bearer {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    // Rate limited or server error; retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "{} API error {}: {}",
                            self.service,
                            status,
                            body_text
                        ));
                        continue;
                    }

                    // Client error other than 429
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("{} API error {}: {}", self.service, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "{} connection error ({}): {}",
                        self.service,
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", self.service)))
    }
}
