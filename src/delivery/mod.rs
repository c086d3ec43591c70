use crate::config::RelayConfig;
use crate::protocol::{BatchEnvelope, DeliveryOutcome, Record};
use crate::{RelayError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest response body echoed into a failure message
const MAX_ERROR_BODY_LEN: usize = 500;

/// Submission interface to the remote collector.
///
/// Implementations never retry internally and hold no record state; retry
/// policy belongs to the sync coordinator. Every attempt yields exactly one
/// [`DeliveryOutcome`], including network-level failures.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Post a single record
    async fn submit_one(&self, record: &Record) -> DeliveryOutcome;

    /// Post an ordered batch as one atomic unit; there is no partial
    /// acknowledgment, the whole batch is delivered or none of it is.
    async fn submit_batch(&self, records: &[Record]) -> DeliveryOutcome;

    /// Lightweight reachability probe, bounded by a short timeout. A hint
    /// for drain scheduling, never a precondition for submission.
    async fn check_health(&self) -> bool;
}

/// HTTP client for the collector endpoints.
///
/// Stateless and cheap to clone; safe to share across calls.
#[derive(Clone)]
pub struct DeliveryClient {
    client: Client,
    base_url: String,
    health_timeout: Duration,
}

impl DeliveryClient {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(format!("{}/{}", crate::NAME, crate::VERSION))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.collector_url.trim_end_matches('/').to_string(),
            health_timeout: Duration::from_secs(config.health_timeout_secs),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Classify an HTTP response: 2xx is delivered, anything else is a
    /// failure carrying the status and a truncated body.
    async fn classify(response: reqwest::Response) -> DeliveryOutcome {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await.unwrap_or_default();
            DeliveryOutcome::Delivered { response: body }
        } else {
            let error = match response.text().await {
                Ok(body) if body.is_empty() => format!("HTTP {}", status.as_u16()),
                Ok(body) if body.len() > MAX_ERROR_BODY_LEN => {
                    format!("HTTP {} - Response too large", status.as_u16())
                }
                Ok(body) => format!("HTTP {}: {}", status.as_u16(), body),
                Err(_) => format!("HTTP {}", status.as_u16()),
            };
            DeliveryOutcome::Failed { error }
        }
    }
}

#[async_trait]
impl Collector for DeliveryClient {
    async fn submit_one(&self, record: &Record) -> DeliveryOutcome {
        debug!("Submitting record {} to collector", record.id);
        match self
            .client
            .post(self.endpoint("/voicedata"))
            .json(record)
            .send()
            .await
        {
            Ok(response) => Self::classify(response).await,
            Err(e) => {
                warn!("Record submission failed: {}", e);
                DeliveryOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn submit_batch(&self, records: &[Record]) -> DeliveryOutcome {
        if records.is_empty() {
            return DeliveryOutcome::Delivered {
                response: String::new(),
            };
        }

        let envelope = BatchEnvelope::new(records.to_vec());
        debug!("Submitting batch of {} record(s) to collector", envelope.count);
        match self
            .client
            .post(self.endpoint("/voicedata/batch"))
            .json(&envelope)
            .send()
            .await
        {
            Ok(response) => Self::classify(response).await,
            Err(e) => {
                warn!("Batch submission failed: {}", e);
                DeliveryOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn check_health(&self) -> bool {
        match self
            .client
            .get(self.endpoint("/health"))
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health probe failed: {}", e);
                false
            }
        }
    }
}
