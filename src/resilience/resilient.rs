//! Whole-operation wrappers that turn errors and timeouts into fallback values.

use std::borrow::Cow;
use std::fmt;
use std::future::IntoFuture;
use std::time::Duration;

use tracing::{error, warn};

use crate::trace::OperationTrace;
use crate::types::{
    Classify, ComponentType, DegradationLevel, ErrorClass, TelemetryMap, TelemetryRecord,
};

/// Message used when a wrapped operation fails and no other was configured.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Operation completed with limitations.";

const PARTIAL_TIMEOUT_MESSAGE: &str = "Operation timed out. Returning partial results.";
const TIMEOUT_REASON: &str = "timeout";

/// Wrapper returned by [`resilient_operation`] and [`with_timeout_fallback`].
///
/// The wrapped future yields its value together with its own telemetry map;
/// the wrapper merges that map into a trace for `component` and always
/// returns `(value, record)`. On error or timeout the value is the configured
/// fallback value.
#[derive(Debug, Clone)]
#[must_use = "a resilient operation does nothing until `run` is awaited"]
pub struct ResilientOperation<T> {
    component: ComponentType,
    fallback_value: T,
    fallback_message: Cow<'static, str>,
    timeout: Option<Duration>,
    timeout_message: Cow<'static, str>,
}

/// Start building a resilient wrapper for `component`.
///
/// ```rust
/// # use huginn::{resilient_operation, ComponentType, HuginnError, TelemetryMap};
/// # tokio_test::block_on(async {
/// let (answer, record) = resilient_operation(ComponentType::RagAsk)
///     .fallback_value(String::new())
///     .run(async { Err::<(String, TelemetryMap), _>(HuginnError::Validation("empty".into())) })
///     .await;
/// assert!(answer.is_empty());
/// assert_eq!(record.degradation_level.as_str(), "failed");
/// # });
/// ```
pub fn resilient_operation(component: ComponentType) -> ResilientOperation<()> {
    ResilientOperation {
        component,
        fallback_value: (),
        fallback_message: Cow::Borrowed(DEFAULT_FALLBACK_MESSAGE),
        timeout: None,
        timeout_message: Cow::Borrowed(PARTIAL_TIMEOUT_MESSAGE),
    }
}

/// Resilient wrapper with a cooperative `timeout`.
///
/// Timeouts report "Operation timed out after N seconds."; errors report
/// "An unexpected error occurred.".
pub fn with_timeout_fallback<T>(
    timeout: Duration,
    fallback_value: T,
    component: ComponentType,
) -> ResilientOperation<T> {
    resilient_operation(component)
        .fallback_value(fallback_value)
        .fallback_message("An unexpected error occurred.")
        .timeout(timeout)
        .timeout_message(format!(
            "Operation timed out after {} seconds.",
            timeout.as_secs_f64()
        ))
}

impl<T> ResilientOperation<T> {
    /// Value returned when the operation fails or times out.
    pub fn fallback_value<U>(self, value: U) -> ResilientOperation<U> {
        ResilientOperation {
            component: self.component,
            fallback_value: value,
            fallback_message: self.fallback_message,
            timeout: self.timeout,
            timeout_message: self.timeout_message,
        }
    }

    /// User-facing message on error.
    pub fn fallback_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.fallback_message = message.into();
        self
    }

    /// Race the operation against a timer.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// User-facing message on timeout.
    pub fn timeout_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.timeout_message = message.into();
        self
    }

    pub fn component(&self) -> ComponentType {
        self.component
    }

    /// Run `operation` and fold its outcome into a finished record.
    ///
    /// A timed-out operation is dropped at its next suspension point.
    pub async fn run<E, F>(self, operation: F) -> (T, TelemetryRecord)
    where
        E: Classify + fmt::Display,
        F: IntoFuture<Output = Result<(T, TelemetryMap), E>>,
    {
        let mut trace = OperationTrace::for_component(self.component);
        let operation = operation.into_future();

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, operation).await.ok(),
            None => Some(operation.await),
        };

        match outcome {
            Some(Ok((value, telemetry))) => {
                trace.merge_external(&telemetry);
                (value, trace.finish())
            }
            Some(Err(e)) => {
                let class = e.class_tag();
                error!(component = %self.component, error_class = %class, error = %e, "operation failed");
                let reason = format!("error_{class}");
                trace.trigger_fallback(&reason);
                trace.set_degradation(DegradationLevel::Failed, &self.fallback_message, Some(&reason));
                trace.set_error_class(class.into_owned());
                (self.fallback_value, trace.finish())
            }
            None => {
                warn!(
                    component = %self.component,
                    timeout_ms = self.timeout.map_or(0, |t| t.as_millis() as u64),
                    "operation timed out"
                );
                trace.trigger_fallback(TIMEOUT_REASON);
                trace.set_degradation(
                    DegradationLevel::Degraded,
                    &self.timeout_message,
                    Some(TIMEOUT_REASON),
                );
                trace.set_error_class(ErrorClass::TimeoutExceeded);
                (self.fallback_value, trace.finish())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HuginnError;
    use serde_json::json;

    fn telemetry(value: serde_json::Value) -> TelemetryMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn success_merges_operation_telemetry() {
        let (value, record) = resilient_operation(ComponentType::RagAsk)
            .fallback_value(0)
            .run(async {
                Ok::<_, HuginnError>((
                    42,
                    telemetry(json!({"latency_ms_llm": 120, "routing_decision": "semantic_search"})),
                ))
            })
            .await;
        assert_eq!(value, 42);
        assert_eq!(record.latency_ms_llm, 120);
        assert_eq!(record.routing_decision, "semantic_search");
        assert_eq!(record.degradation_level, DegradationLevel::None);
    }

    #[tokio::test]
    async fn error_returns_fallback_value() {
        let (value, record) = resilient_operation(ComponentType::Summarize)
            .fallback_value(vec!["fallback"])
            .run(async { Err::<(Vec<&str>, TelemetryMap), _>(HuginnError::Connection("reset".into())) })
            .await;
        assert_eq!(value, vec!["fallback"]);
        assert_eq!(record.degradation_level, DegradationLevel::Failed);
        assert_eq!(record.graceful_message.as_deref(), Some(DEFAULT_FALLBACK_MESSAGE));
        assert_eq!(record.fallback_reason.as_deref(), Some("error_ConnectionError"));
        assert!(record.fallback_triggered);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_degrades_instead_of_failing() {
        let (value, record) = with_timeout_fallback(Duration::from_secs(5), "partial", ComponentType::AgentRun)
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, HuginnError>(("full", TelemetryMap::new()))
            })
            .await;
        assert_eq!(value, "partial");
        assert_eq!(record.degradation_level, DegradationLevel::Degraded);
        assert_eq!(
            record.graceful_message.as_deref(),
            Some("Operation timed out after 5 seconds.")
        );
        assert_eq!(record.fallback_reason.as_deref(), Some("timeout"));
        assert_eq!(record.error_class.as_deref(), Some("TIMEOUT_EXCEEDED"));
    }

    #[tokio::test]
    async fn with_timeout_fallback_error_message() {
        let (_, record) = with_timeout_fallback(Duration::from_secs(1), (), ComponentType::CsvInsights)
            .run(async { Err::<((), TelemetryMap), _>(HuginnError::Validation("bad csv".into())) })
            .await;
        assert_eq!(
            record.graceful_message.as_deref(),
            Some("An unexpected error occurred.")
        );
        assert!(!record.graceful_message.unwrap().contains("bad csv"));
    }
}
