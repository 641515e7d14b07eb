//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values supplied on the command line or through environment variables.
///
/// Unset and empty values leave the file/default value in place.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub upstream_endpoint: Option<String>,
    pub bind_address: Option<String>,
    pub log_file_path: Option<String>,
    pub api_key: Option<String>,
}

impl ConfigOverrides {
    /// Apply every non-empty override onto `config`.
    pub fn apply(&self, config: &mut ProxyConfig) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                *target = v.to_string();
            }
        }

        set(&mut config.upstream.endpoint, &self.upstream_endpoint);
        set(&mut config.listener.bind_address, &self.bind_address);
        set(&mut config.capture.log_file_path, &self.log_file_path);
        set(&mut config.auth.api_key, &self.api_key);
    }
}

/// Resolve the effective configuration: defaults, then the optional file,
/// then overrides. Validation runs once on the merged result.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    overrides.apply(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
