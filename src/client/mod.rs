//! Health-data fetch from the router's local health-check endpoint
//!
//! One GET per invocation, bounded by a fixed timeout. The endpoint serves
//! a self-signed certificate on 127.0.0.1, so certificate verification is
//! disabled. Any failure here means the node cannot vouch for its own
//! health and the caller must treat it as unhealthy.

use crate::contracts::*;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on the health-data fetch
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors raised while fetching or interpreting health data
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("Health endpoint request failed: {0}")]
    Request(String),

    #[error("Failed to parse health payload: {0}")]
    Parse(String),

    #[error("Health payload is missing check {0:?}")]
    MissingCheck(&'static str),

    #[error("Health payload contains duplicate check {0:?}")]
    DuplicateCheck(&'static str),
}

/// Client for the router's health-check API
pub struct HealthClient {
    url: String,
    client: reqwest::Client,
}

impl HealthClient {
    /// Client for the local health-check listener
    pub fn new(port: u16, path: &str) -> Result<Self, ClientError> {
        Self::for_url(format!("https://127.0.0.1:{}/{}", port, path))
    }

    /// Client for an explicit URL; used by tests against a mock endpoint
    pub fn for_url(url: String) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self { url, client })
    }

    /// Fetch one snapshot of health data
    pub async fn fetch(&self) -> Result<HealthSummary, ClientError> {
        tracing::debug!(url = %self.url, "Fetching health data");

        let response = self
            .client
            .get(&self.url)
            .header("content-type", "application/json")
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;

        let envelope: HealthResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))?;

        Ok(envelope.data)
    }
}

/// Pull the two known checks out of the payload, enforcing exactly one of each.
pub fn extract_checks(
    summary: HealthSummary,
) -> Result<(ControlCheckResult, LinkCheckResult), ClientError> {
    let mut control = None;
    let mut link = None;

    for entry in summary.checks {
        match entry {
            CheckEntry::ControllerPing(c) => {
                if control.replace(c).is_some() {
                    return Err(ClientError::DuplicateCheck(CONTROLLER_PING_ID));
                }
            }
            CheckEntry::LinkHealth(l) => {
                if link.replace(l).is_some() {
                    return Err(ClientError::DuplicateCheck(LINK_HEALTH_ID));
                }
            }
            CheckEntry::Other => {}
        }
    }

    let control = control.ok_or(ClientError::MissingCheck(CONTROLLER_PING_ID))?;
    let link = link.ok_or(ClientError::MissingCheck(LINK_HEALTH_ID))?;
    Ok((control, link))
}
