//! Retry, timeout and fallback strategies.
//!
//! Everything here returns `(value, TelemetryRecord)` (or folds into an
//! [`OperationTrace`](crate::OperationTrace)) rather than an error: business
//! failures become degraded values with the cause in telemetry. Only invalid
//! configuration is reported as [`HuginnError`](crate::HuginnError).

pub mod fallback;
mod fan_out;
mod latency;
mod resilient;
mod retry;

pub use fallback::{
    EmbeddingFallbackHandler, FallbackHandler, ItemFailure, PartialFailureHandler, PartialOutcome,
    VectorDBFallbackHandler, WeakSignalHandler,
};
pub use fan_out::join_traced;
pub use latency::{Timed, measure_latency, measure_latency_blocking};
pub use resilient::{
    DEFAULT_FALLBACK_MESSAGE, ResilientOperation, resilient_operation, with_timeout_fallback,
};
pub use retry::{
    ANSWER_APOLOGY, AnswerPayload, DegradedDefault, OperationCategory, PredictionPayload,
    RetryExecutor, RetryMeta, RetryPolicy, Retrying, retry_with_backoff,
};
