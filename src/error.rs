// src/error.rs

//! Unified error handling for the collection dumper.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for dumper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSV writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Image encoding/writing failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// QR code construction failed
    #[error("QR code error: {0}")]
    Qr(#[from] qrcode::types::QrError),

    /// Authentication rejected by the API
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote rate limit hit (HTTP 429)
    #[error("Rate limited by the API")]
    RateLimited { retry_after: Option<Duration> },

    /// Remote server error (HTTP 5xx)
    #[error("Server error: HTTP {status}")]
    Server { status: u16 },

    /// Unexpected API response
    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Response payload could not be decoded
    #[error("Decode error for {context}: {message}")]
    Decode { context: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Checkpoint persistence error
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Enrichment error
    #[error("Enrichment error for {context}: {message}")]
    Enrich { context: String, message: String },

    /// All retry attempts were consumed
    #[error("{context}: giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        context: String,
        attempts: u32,
        #[source]
        source: Box<AppError>,
    },

    /// Run was interrupted by the user
    #[error("Interrupted")]
    Interrupted,
}

impl AppError {
    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a decode error with context.
    pub fn decode(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a checkpoint error.
    pub fn checkpoint(message: impl fmt::Display) -> Self {
        Self::Checkpoint(message.to_string())
    }

    /// Create an enrichment error with context.
    pub fn enrich(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Enrich {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Wrap the final error after exhausting retries.
    pub fn retries_exhausted(context: impl Into<String>, attempts: u32, source: AppError) -> Self {
        Self::RetriesExhausted {
            context: context.into(),
            attempts,
            source: Box::new(source),
        }
    }

    /// Whether a request that produced this error is worth retrying.
    ///
    /// Rate limiting, server errors, and transport-level failures are
    /// transient. Everything else (auth, not-found, decode, config,
    /// request construction) will fail the same way on the next attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Server { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(AppError::RateLimited { retry_after: None }.is_retryable());
        assert!(AppError::Server { status: 503 }.is_retryable());
        assert!(!AppError::auth("bad token").is_retryable());
        assert!(!AppError::not_found("no such user").is_retryable());
        assert!(
            !AppError::Api {
                status: 400,
                message: "bad request".into()
            }
            .is_retryable()
        );
    }

    #[tokio::test]
    async fn malformed_request_is_not_retryable() {
        // Fails while building the request, before anything goes over
        // the wire; retrying would fail identically every time.
        let err = reqwest::Client::new()
            .get("http://")
            .send()
            .await
            .unwrap_err();
        assert!(!AppError::Http(err).is_retryable());
    }

    #[test]
    fn retries_exhausted_preserves_source() {
        let err = AppError::retries_exhausted("page 3", 4, AppError::Server { status: 500 });
        let text = err.to_string();
        assert!(text.contains("page 3"));
        assert!(text.contains("4 attempts"));
        assert!(text.contains("500"));
    }
}
