//! Error types for the quote client

use thiserror::Error;

/// Errors that can occur when fetching a quote
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    /// The base URL cannot be used to build a request
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Response body is not a quote
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// API answered with a non-success status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}
