//! Configuration for the demo binary.
//!
//! Loads configuration from environment variables (after `.env`, if present)
//! with defaults for everything.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use todo_sync_quote::QuoteConfig;

/// Default quote API root
pub const DEFAULT_QUOTE_API_URL: &str = "https://dummyjson.com/";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Quote API settings
    pub quote: QuoteSettings,
    /// User whose list the demo observes
    pub user_id: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Quote API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSettings {
    /// API root, always ending in `/`
    pub api_url: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl AppConfig {
    /// Loads `.env` (if any), then reads the process environment
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when a numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut api_url =
            lookup("QUOTE_API_URL").unwrap_or_else(|| DEFAULT_QUOTE_API_URL.to_string());
        if !api_url.ends_with('/') {
            api_url.push('/');
        }

        Ok(Self {
            quote: QuoteSettings {
                api_url,
                timeout: parse_secs(&lookup, "QUOTE_TIMEOUT_SECS", 10)?,
            },
            user_id: lookup("TODO_USER_ID").unwrap_or_else(|| "demo-user".to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            shutdown_timeout: parse_secs(&lookup, "SHUTDOWN_TIMEOUT_SECS", 5)?,
        })
    }

    /// Quote client configuration
    #[must_use]
    pub fn quote_config(&self) -> QuoteConfig {
        QuoteConfig::new(self.quote.api_url.clone())
            .with_timeout(Duration::from_secs(self.quote.timeout))
    }

    /// Graceful shutdown timeout
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

fn parse_secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) => Ok(secs),
            Err(e) => Err(ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        },
    }
}
