//! Webhook client for audited actions
//!
//! One JSON POST per audit entry. Each attempt is bounded by a timeout; failed attempts
//! (network error or non-2xx status) are retried with a doubling backoff up to
//! `max_attempts` in total.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("stagepass-roles/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Webhook responded with status {0}")]
    Status(u16),

    #[error("Webhook client setup failed: {0}")]
    Client(String),
}

/// Body POSTed to the webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub request_id: i64,
    pub user_email: String,
    pub action: String,
    pub notes: String,
    /// Creation time of the audit entry (RFC 3339)
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct WebhookClient {
    http_client: reqwest::Client,
    url: String,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl WebhookClient {
    pub fn new(
        url: String,
        timeout: Duration,
        max_attempts: u32,
        retry_backoff: Duration,
    ) -> Result<Self, WebhookError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| WebhookError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            url,
            max_attempts: max_attempts.max(1),
            retry_backoff,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver `payload`, retrying transient failures
    ///
    /// Returns the last error once every attempt has failed.
    pub async fn post(&self, payload: &WebhookPayload) -> Result<(), WebhookError> {
        let mut backoff = self.retry_backoff;
        let mut attempt = 1;

        loop {
            match self.post_once(payload).await {
                Ok(()) => {
                    debug!(
                        request_id = payload.request_id,
                        action = %payload.action,
                        attempt,
                        "Webhook delivered"
                    );
                    return Ok(());
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        request_id = payload.request_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Webhook attempt failed, retrying in {:?}: {}",
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once(&self, payload: &WebhookPayload) -> Result<(), WebhookError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| WebhookError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status(status.as_u16()));
        }
        Ok(())
    }
}
