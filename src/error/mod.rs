//! Error types for Weft.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Primary error type for all Weft operations.
#[derive(Error, Debug)]
pub enum WeftError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Upstream idle for {0}ms")]
    UpstreamTimeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Session cancelled")]
    Cancelled,
}

/// Stable error kinds carried inside an `Error` frame.
///
/// These are part of the outbound wire contract: renderers branch on the
/// kind string, so variants are only ever added, never renamed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    UpstreamError,
    UpstreamTimeout,
    RateLimited,
    Auth,
    Cancelled,
    Internal,
}

impl WeftError {
    /// Create an API error from a status code and body text.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// The stable kind reported to the renderer when this error terminates
    /// a stream.
    pub fn wire_kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Auth,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::UpstreamTimeout(_) => ErrorKind::UpstreamTimeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorKind::Auth,
                429 => ErrorKind::RateLimited,
                _ => ErrorKind::UpstreamError,
            },
            Self::Network(_) | Self::Stream(_) | Self::Io(_) => ErrorKind::UpstreamError,
            Self::Configuration(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error is potentially retryable with a fresh session.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::UpstreamTimeout(_) => true,
            Self::Api { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, WeftError>;
