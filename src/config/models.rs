//! Configuration data structures for fetchgate.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and to
//! `FETCHGATE__*` environment variables. Every field has a default so the gateway runs
//! with no configuration file at all.
use std::{
    collections::BTreeMap,
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::core::admission::DEFAULT_MAX_CONCURRENT;

pub const DEFAULT_PORT: u16 = 4829;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// Top-level gateway configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    /// Interface to bind
    pub host: String,
    /// Listening port (`PORT` environment variable)
    pub port: u16,
    /// Require TLS 1.3 for outbound connections (`TLS13` environment variable)
    pub tls13: bool,
    pub admission: AdmissionConfig,
    pub server: ServerSettings,
    pub defaults: RequestDefaults,
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tls13: false,
            admission: AdmissionConfig::default(),
            server: ServerSettings::default(),
            defaults: RequestDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Socket address built from `host` and `port`.
    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Concurrency ceiling for backend invocations
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum number of requests executing against the backend at once
    pub max_concurrent: usize,
    /// How long a request may wait for a free slot, counted from arrival
    pub timeout_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 60,
        }
    }
}

impl AdmissionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Inbound HTTP server settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    /// Grace period for in-flight requests after a termination signal
    pub shutdown_grace_secs: u64,
    /// Maximum accepted `/handle` body size
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 30,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ServerSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Values applied to a request when the caller leaves them out.
///
/// Shared read-only by every request after startup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RequestDefaults {
    pub method: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Header table every request starts from; caller headers are layered on top
    pub headers: BTreeMap<String, String>,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        let headers = [
            ("accept", "*/*"),
            ("accept-encoding", "gzip, deflate, br, zstd"),
            ("accept-language", "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
            ("cache-control", "no-cache"),
            ("pragma", "no-cache"),
            ("priority", "u=1, i"),
            (
                "sec-ch-ua",
                r#""Google Chrome";v="143", "Chromium";v="143", "Not A(Brand";v="24""#,
            ),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", r#""Windows""#),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "same-site"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            method: "GET".to_string(),
            timeout_ms: 30_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers,
        }
    }
}

/// Logging output settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// JSON lines when true, human-readable otherwise
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}
