//! Error taxonomy and failure classification.
//!
//! Tags are stored in [`TelemetryRecord::error_class`](crate::TelemetryRecord)
//! as strings. The fixed taxonomy lives in [`ErrorClass`]; unclassified
//! errors are tagged with their unqualified type name.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Structured error classes for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    /// Retrieval produced results too weak to rely on.
    RetrievalWeakSignal,
    /// No LLM provider could serve the request.
    LlmProviderUnavailable,
    /// A cached value was served after the live path failed.
    CacheRecovery,
    /// A safe-mode policy replaced the normal answer path.
    SafeModeFallback,
    /// The operation ran out of wall-clock budget.
    TimeoutExceeded,
    /// Transient network failures exhausted the retry budget.
    NetworkError,
    /// Input or payload failed validation.
    ValidationError,
}

impl ErrorClass {
    /// The tag stored in `error_class`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RetrievalWeakSignal => "RETRIEVAL_WEAK_SIGNAL",
            Self::LlmProviderUnavailable => "LLM_PROVIDER_UNAVAILABLE",
            Self::CacheRecovery => "CACHE_RECOVERY",
            Self::SafeModeFallback => "SAFE_MODE_FALLBACK",
            Self::TimeoutExceeded => "TIMEOUT_EXCEEDED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorClass> for String {
    fn from(class: ErrorClass) -> Self {
        class.as_str().to_string()
    }
}

/// Classification of a failure for retry and telemetry purposes.
///
/// Implement this for the error types of wrapped operations. The defaults
/// treat every error as terminal and tag it with its type name, the same
/// way an unclassified exception would be reported.
pub trait Classify {
    /// Whether retrying may succeed (connection, timeout, OS-level transient).
    fn is_transient(&self) -> bool {
        false
    }

    /// Tag stored in `error_class` when this error ends an operation or step.
    fn class_tag(&self) -> Cow<'static, str> {
        Cow::Borrowed(type_tag::<Self>())
    }

    /// Delay hint supplied with the failure, preferred over computed backoff.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Unqualified type name of `T`, without generic arguments.
///
/// `std::io::error::Error` becomes `Error`, `alloc::vec::Vec<u8>` becomes `Vec`.
pub fn type_tag<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl Classify for io::Error {
    fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::TimedOut
                | io::ErrorKind::Interrupted
                | io::ErrorKind::WouldBlock
                | io::ErrorKind::UnexpectedEof
        )
    }

    fn class_tag(&self) -> Cow<'static, str> {
        Cow::Owned(format!("{:?}", self.kind()))
    }
}

impl Classify for tokio::time::error::Elapsed {
    fn is_transient(&self) -> bool {
        true
    }

    fn class_tag(&self) -> Cow<'static, str> {
        Cow::Borrowed(ErrorClass::TimeoutExceeded.as_str())
    }
}

impl Classify for serde_json::Error {
    fn class_tag(&self) -> Cow<'static, str> {
        Cow::Borrowed(ErrorClass::ValidationError.as_str())
    }
}
