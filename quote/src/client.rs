//! HTTP client for the random quote endpoint

use crate::{error::QuoteError, types::Quote};
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com/";

/// Quote client configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuoteConfig {
    /// API root; a trailing `/` is added when missing
    pub base_url: String,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl QuoteConfig {
    /// Configuration for `base_url` with a 10 second timeout
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Anything that can produce a random quote
///
/// Boxed futures keep the trait usable as `Arc<dyn QuoteSource>` inside
/// reducer environments.
pub trait QuoteSource: Send + Sync {
    /// Fetches one random quote
    ///
    /// # Errors
    ///
    /// Returns a [`QuoteError`] when no quote could be obtained.
    fn random_quote(&self) -> Pin<Box<dyn Future<Output = Result<Quote, QuoteError>> + Send + '_>>;
}

/// Quote API client
///
/// No authentication and no retry: a failed fetch is reported once and the
/// caller decides whether to fetch again.
#[derive(Clone, Debug)]
pub struct QuoteClient {
    client: Client,
    base_url: String,
}

fn with_trailing_slash(base_url: impl Into<String>) -> String {
    let mut base_url = base_url.into();
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    base_url
}

impl QuoteClient {
    /// Create a client for `base_url` with default HTTP settings
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: with_trailing_slash(base_url),
        }
    }

    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// - [`QuoteError::InvalidBaseUrl`] if the base URL is not http(s)
    /// - [`QuoteError::RequestFailed`] if the HTTP client cannot be built
    pub fn from_config(config: &QuoteConfig) -> Result<Self, QuoteError> {
        if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
            return Err(QuoteError::InvalidBaseUrl(config.base_url.clone()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QuoteError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: with_trailing_slash(config.base_url.clone()),
        })
    }

    /// API root, ending in `/`
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the random quote endpoint
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}quotes/random", self.base_url)
    }

    /// `GET {base_url}quotes/random`
    ///
    /// # Errors
    ///
    /// - [`QuoteError::RequestFailed`] for transport failures and timeouts
    /// - [`QuoteError::Api`] for non-2xx responses
    /// - [`QuoteError::ResponseParseFailed`] if the body is not a quote
    #[tracing::instrument(skip(self), fields(url = %self.endpoint()))]
    pub async fn random_quote(&self) -> Result<Quote, QuoteError> {
        let response = self
            .client
            .get(self.endpoint())
            .send()
            .await
            .map_err(|e| QuoteError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Quote API returned an error");
            return Err(QuoteError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json::<Quote>()
            .await
            .map_err(|e| QuoteError::ResponseParseFailed(e.to_string()))
    }
}

impl QuoteSource for QuoteClient {
    fn random_quote(&self) -> Pin<Box<dyn Future<Output = Result<Quote, QuoteError>> + Send + '_>> {
        Box::pin(Self::random_quote(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = QuoteClient::new("https://dummyjson.com");
        assert_eq!(client.base_url(), "https://dummyjson.com/");
        assert_eq!(client.endpoint(), "https://dummyjson.com/quotes/random");
    }

    #[test]
    fn test_from_config_rejects_non_http_urls() {
        let err = QuoteClient::from_config(&QuoteConfig::new("ftp://example.com/")).err();
        assert_eq!(
            err,
            Some(QuoteError::InvalidBaseUrl("ftp://example.com/".to_string()))
        );
    }

    #[test]
    fn test_default_config() {
        let config = QuoteConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }
}
