//! Health-check payload types
//!
//! The router's health endpoint returns `{ "data": { "healthy": ..,
//! "checks": [ .. ] } }` where each check entry is identified by its `id`.
//! Only `controllerPing` and `link.health` matter to the failover decision;
//! other checks are preserved as [`CheckEntry::Other`] and ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Check id of the control-plane ping entry
pub const CONTROLLER_PING_ID: &str = "controllerPing";

/// Check id of the aggregate data-link entry
pub const LINK_HEALTH_ID: &str = "link.health";

/// Envelope returned by the health endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub data: HealthSummary,
}

/// The `data` object of the health payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    /// Overall verdict of the health subsystem (logged, not decided on)
    pub healthy: bool,

    /// Individual check entries, tagged by id
    #[serde(default)]
    pub checks: Vec<CheckEntry>,
}

/// One entry of the `data.checks` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "id")]
pub enum CheckEntry {
    #[serde(rename = "controllerPing")]
    ControllerPing(ControlCheckResult),

    #[serde(rename = "link.health")]
    LinkHealth(LinkCheckResult),

    /// Any check this tool does not evaluate
    #[serde(other)]
    Other,
}

/// Health state of the control-plane connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlCheckResult {
    pub healthy: bool,

    #[serde(default)]
    pub consecutive_failures: u32,

    /// Start of the current failure; present only while the check is failing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failing_since: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_time: Option<DateTime<Utc>>,
}

impl ControlCheckResult {
    /// Seconds between the failure start and the subsystem's own last check.
    ///
    /// Computed from the payload's timestamps rather than the evaluation
    /// clock, so a decision is reproducible from a single snapshot.
    pub fn elapsed_secs(&self) -> Option<i64> {
        match (self.failing_since, self.last_check_time) {
            (Some(since), Some(last)) => Some((last - since).num_seconds()),
            _ => None,
        }
    }
}

/// Aggregate health of the data-plane links to peer routers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCheckResult {
    pub healthy: bool,

    /// One entry per physical link; absent when no links exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<LinkDetail>>,
}

/// One physical link entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDetail {
    pub dest_router_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<LinkAddresses>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAddresses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<LinkAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAddress {
    pub remote_addr: String,
}

impl LinkDetail {
    /// Host component of the ack address.
    ///
    /// The wire carries either `proto:host:port` or `host:port`. Anything
    /// else is unparseable and the caller must treat the link as excluded.
    pub fn remote_host(&self) -> Option<&str> {
        let addr = self.addresses.as_ref()?.ack.as_ref()?.remote_addr.as_str();
        let parts: Vec<&str> = addr.split(':').collect();
        let host = match parts.len() {
            2 => parts[0],
            3 => parts[1],
            _ => return None,
        };
        if host.is_empty() {
            None
        } else {
            Some(host)
        }
    }
}
