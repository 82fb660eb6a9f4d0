//! Router configuration and administrative policy loading
//!
//! Two YAML inputs feed the engine: the router's own config file (control
//! endpoint plus the health-check web listener) and an optional list of
//! router ids carrying the no-traversal flag. Config problems mean "cannot
//! evaluate this cycle" and must never force a failover; the exclusion list
//! degrades to empty rather than failing at all.

use serde::Deserialize;
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;

/// Default router config location on an edge node
pub const DEFAULT_CONFIG_PATH: &str = "/opt/netfoundry/ziti/ziti-router/config.yml";

/// Default drain grace period
pub const DEFAULT_SWITCH_TIMEOUT_SECS: u64 = 600;

/// Name of the web listener that serves the health-check API
const HEALTH_CHECK_LISTENER: &str = "health-check";

/// Errors raised while loading or interpreting the router config
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Router config has no web listener named \"health-check\"")]
    MissingHealthCheckListener,

    #[error("Health-check listener has no bind point")]
    MissingBindPoint,

    #[error("Health-check listener has no API binding")]
    MissingApiBinding,

    #[error("Bind point address {0:?} has no port component")]
    MalformedBindAddress(String),

    #[error("Control endpoint {0:?} has no host component")]
    MalformedControlEndpoint(String),

    #[error("Failed to resolve control host {host}: {detail}")]
    Resolution { host: String, detail: String },
}

/// The parts of the router config file this tool consumes
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    pub ctrl: CtrlConfig,

    #[serde(default)]
    pub web: Vec<WebListener>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CtrlConfig {
    /// Control endpoint in `proto:host:port` form
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebListener {
    pub name: String,

    #[serde(default)]
    pub bind_points: Vec<BindPoint>,

    #[serde(default)]
    pub apis: Vec<ApiBinding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BindPoint {
    /// Bind address in `host:port` form
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBinding {
    pub binding: String,
}

impl RouterConfig {
    /// Load and parse the router config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!(path = %path.display(), "Parsing router config");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Port and URL path of the local health-check API.
    ///
    /// The listener may bind a wildcard or LAN interface; only the port is
    /// reused since the fetch always targets 127.0.0.1.
    pub fn health_check_endpoint(&self) -> Result<(u16, String), ConfigError> {
        let listener = self
            .web
            .iter()
            .find(|w| w.name == HEALTH_CHECK_LISTENER)
            .ok_or(ConfigError::MissingHealthCheckListener)?;

        let bind = listener
            .bind_points
            .first()
            .ok_or(ConfigError::MissingBindPoint)?;
        let port = bind
            .address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(|| ConfigError::MalformedBindAddress(bind.address.clone()))?;

        let api = listener
            .apis
            .first()
            .ok_or(ConfigError::MissingApiBinding)?;

        Ok((port, api.binding.clone()))
    }

    /// Host component of the control endpoint (`proto:host:port` or `host:port`)
    pub fn control_host(&self) -> Result<&str, ConfigError> {
        let endpoint = self.ctrl.endpoint.as_str();
        let parts: Vec<&str> = endpoint.split(':').collect();
        let host = match parts.len() {
            2 => parts[0],
            3 => parts[1],
            _ => return Err(ConfigError::MalformedControlEndpoint(endpoint.to_string())),
        };
        if host.is_empty() {
            return Err(ConfigError::MalformedControlEndpoint(endpoint.to_string()));
        }
        Ok(host)
    }

    /// Resolved address(es) of the control endpoint.
    ///
    /// IP literals pass through without touching DNS.
    pub async fn control_addresses(&self) -> Result<Vec<IpAddr>, ConfigError> {
        let host = self.control_host()?;
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        let addrs = tokio::net::lookup_host((host, 0u16))
            .await
            .map_err(|e| ConfigError::Resolution {
                host: host.to_string(),
                detail: e.to_string(),
            })?;

        let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
        if ips.is_empty() {
            return Err(ConfigError::Resolution {
                host: host.to_string(),
                detail: "lookup returned no addresses".to_string(),
            });
        }
        Ok(ips)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExclusionFile {
    #[serde(default)]
    router_ids: Option<Vec<String>>,
}

/// Load the non-traversable router list.
///
/// Administrative policy input only: a missing, unreadable, or malformed
/// file degrades to an empty set with a warning, never a fatal error.
pub fn load_exclusions(path: Option<&Path>) -> HashSet<String> {
    let Some(path) = path else {
        return HashSet::new();
    };

    tracing::debug!(path = %path.display(), "Parsing exclusion list");
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Cannot read exclusion list; continuing with empty policy");
            return HashSet::new();
        }
    };

    match serde_yaml::from_str::<ExclusionFile>(&content) {
        Ok(file) => file.router_ids.unwrap_or_default().into_iter().collect(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Cannot parse exclusion list; continuing with empty policy");
            HashSet::new()
        }
    }
}
