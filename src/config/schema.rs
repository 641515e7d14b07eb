//! Configuration schema.
//!
//! Every section is optional in the TOML file; missing keys take the
//! defaults below, which match a bare `capture-proxy` invocation.

use serde::{Deserialize, Serialize};
use std::net::{AddrParseError, SocketAddr};

/// Root configuration for the capture proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream AI-service endpoint.
    pub upstream: UpstreamConfig,

    /// Interaction record capture settings.
    pub capture: CaptureConfig,

    /// Inbound authentication.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080" or ":8080").
    pub bind_address: String,

    /// How long shutdown waits for exchanges whose client already left.
    pub drain_timeout_secs: u64,
}

impl ListenerConfig {
    /// Parse the bind address. A bare `:port` binds every interface.
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        match self.bind_address.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{}", port).parse(),
            None => self.bind_address.parse(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            drain_timeout_secs: 30,
        }
    }
}

/// Upstream endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL every request is forwarded beneath.
    pub endpoint: String,

    /// Idle pooled connections kept per upstream host.
    pub pool_max_idle_per_host: usize,

    /// TCP connect timeout in seconds (0 disables).
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://your-deployment.openai.azure.com/".to_string(),
            pool_max_idle_per_host: 32,
            connect_timeout_secs: 10,
        }
    }
}

/// Interaction record capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Append-only JSON-lines destination.
    pub log_file_path: String,

    /// Largest inbound request body buffered in memory. Upstream responses
    /// are always read in full.
    pub max_body_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            log_file_path: "openai_proxy.json".to_string(),
            max_body_bytes: 32 * 1024 * 1024, // 32MB
        }
    }
}

/// Inbound authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Pre-shared key expected in `X-API-Key`. Empty disables the check.
    pub api_key: String,
}

impl AuthConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit operational traces as JSON instead of human-readable text.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
