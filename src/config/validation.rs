//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the upstream endpoint is an absolute http(s) URL with a host
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("upstream.endpoint {0:?} is not a valid URL: {1}")]
    UpstreamUrl(String, String),

    #[error("upstream.endpoint {0:?} must use http or https")]
    UpstreamScheme(String),

    #[error("upstream.endpoint {0:?} has no host")]
    UpstreamHost(String),

    #[error("capture.log_file_path must not be empty")]
    LogPath,

    #[error("capture.max_body_bytes must be greater than zero")]
    MaxBodyBytes,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.socket_addr().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let endpoint = &config.upstream.endpoint;
    match Url::parse(endpoint) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                errors.push(ValidationError::UpstreamScheme(endpoint.clone()));
            }
            if url.host_str().map_or(true, str::is_empty) {
                errors.push(ValidationError::UpstreamHost(endpoint.clone()));
            }
        }
        Err(e) => errors.push(ValidationError::UpstreamUrl(endpoint.clone(), e.to_string())),
    }

    if config.capture.log_file_path.trim().is_empty() {
        errors.push(ValidationError::LogPath);
    }

    if config.capture.max_body_bytes == 0 {
        errors.push(ValidationError::MaxBodyBytes);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
