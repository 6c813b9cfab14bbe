//! Configuration for the bridge server.
//!
//! Configuration can be set via environment variables:
//! - `BRIDGE_UPSTREAM_URL` - Required. Base URL of the upstream agent.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `UPSTREAM_TIMEOUT_SECS` - Optional. Timeout for unary upstream calls
//!   (stop/health). Defaults to `30`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Bridge server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the upstream agent
    pub upstream_url: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Timeout for unary upstream calls
    pub upstream_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `BRIDGE_UPSTREAM_URL` is not
    /// set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let upstream_url = std::env::var("BRIDGE_UPSTREAM_URL")
            .map_err(|_| ConfigError::MissingEnvVar("BRIDGE_UPSTREAM_URL".to_string()))?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let timeout_secs: u64 = std::env::var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("UPSTREAM_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        Ok(Self {
            upstream_url,
            host,
            port,
            upstream_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(upstream_url: String) -> Self {
        Self {
            upstream_url,
            host: "127.0.0.1".to_string(),
            port: 3000,
            upstream_timeout: Duration::from_secs(30),
        }
    }
}
