//! Broker configuration.
//!
//! Configuration is loaded from environment variables. The provider secret is
//! held as a `SecretString` and redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default video provider REST endpoint.
pub const DEFAULT_VIDEO_API_URL: &str = "https://api.opentok.com";

/// Default timeout for a single provider call, in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 10;

/// Default lifetime of participant session tokens (one day).
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 86_400;

/// Longest token lifetime the provider accepts (30 days).
pub const MAX_TOKEN_TTL_SECONDS: u64 = 2_592_000;

/// Broker configuration.
#[derive(Clone)]
pub struct Config {
    /// Provider project API key. Public; returned to clients with every credential.
    pub api_key: String,

    /// Provider project secret.
    pub api_secret: SecretString,

    /// Server bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Base URL of the provider REST API.
    pub video_api_url: String,

    /// Timeout for provider calls in seconds.
    pub provider_timeout_seconds: u64,

    /// Lifetime of participant tokens in seconds.
    pub token_ttl_seconds: u64,

    /// Seconds to keep draining connections after a shutdown signal.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("video_api_url", &self.video_api_url)
            .field("provider_timeout_seconds", &self.provider_timeout_seconds)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid provider timeout configuration: {0}")]
    InvalidProviderTimeout(String),

    #[error("Invalid token TTL configuration: {0}")]
    InvalidTokenTtl(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainPeriod(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_key = required(vars, "TOKBOX_API_KEY")?;
        let api_secret = SecretString::from(required(vars, "TOKBOX_SECRET")?);

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let video_api_url = vars
            .get("VIDEO_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_VIDEO_API_URL.to_string());

        let provider_timeout_seconds =
            if let Some(value_str) = vars.get("PROVIDER_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidProviderTimeout(format!(
                        "PROVIDER_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidProviderTimeout(
                        "PROVIDER_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                value
            } else {
                DEFAULT_PROVIDER_TIMEOUT_SECONDS
            };

        let token_ttl_seconds = if let Some(value_str) = vars.get("TOKEN_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidTokenTtl(format!(
                    "TOKEN_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidTokenTtl(
                    "TOKEN_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_TOKEN_TTL_SECONDS {
                return Err(ConfigError::InvalidTokenTtl(format!(
                    "TOKEN_TTL_SECONDS must not exceed {} seconds, got {}",
                    MAX_TOKEN_TTL_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_TOKEN_TTL_SECONDS
        };

        let drain_seconds = match vars.get("BROKER_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainPeriod(format!(
                    "BROKER_DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => 0,
        };

        Ok(Config {
            api_key,
            api_secret,
            bind_address,
            video_api_url,
            provider_timeout_seconds,
            token_ttl_seconds,
            drain_seconds,
        })
    }
}

/// Fetch a variable that must be present and non-empty.
fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|value| !value.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}
