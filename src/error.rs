//! Huginn error types

use std::borrow::Cow;
use std::time::Duration;

use crate::types::{Classify, ErrorClass};

/// Huginn error types
///
/// Wrapped operations report failures through this type (or any other type
/// implementing [`Classify`]). The core itself only returns `Err` for
/// configuration mistakes; business failures become degraded values plus a
/// [`TelemetryRecord`](crate::TelemetryRecord).
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Transport errors
    #[error("connection error: {0}")]
    Connection(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    // Collaborator errors
    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    // Data errors
    #[error("validation error: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HuginnError {
    /// Whether a retry may succeed where this attempt failed.
    ///
    /// Connection, timeout, I/O and rate-limit errors are transient, as are
    /// provider 5xx responses. Everything else is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::Io(_) | Self::RateLimited { .. } => {
                true
            }
            Self::Provider { status, .. } => (500..600).contains(status),
            Self::ProviderUnavailable(_)
            | Self::Validation(_)
            | Self::Json(_)
            | Self::Configuration(_) => false,
        }
    }

    /// Provider-supplied delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl Classify for HuginnError {
    fn is_transient(&self) -> bool {
        HuginnError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        HuginnError::retry_after(self)
    }

    fn class_tag(&self) -> Cow<'static, str> {
        let tag = match self {
            Self::Connection(_) => "ConnectionError",
            Self::Timeout(_) => ErrorClass::TimeoutExceeded.as_str(),
            Self::Io(_) => "IoError",
            Self::RateLimited { .. } => "RateLimited",
            Self::Provider { .. } => "ProviderError",
            Self::ProviderUnavailable(_) => ErrorClass::LlmProviderUnavailable.as_str(),
            Self::Validation(_) | Self::Json(_) => ErrorClass::ValidationError.as_str(),
            Self::Configuration(_) => "ConfigurationError",
        };
        Cow::Borrowed(tag)
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
