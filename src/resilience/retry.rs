//! Bounded retry with exponential backoff and a wall-clock budget.
//!
//! [`RetryExecutor`] never returns an error for a business failure. Transient
//! errors (per [`Classify::is_transient`]) are retried up to the policy's
//! budget; terminal errors, exhaustion and timeout all resolve to a
//! deterministic [`DegradedDefault`] value chosen by the operation's
//! [`OperationCategory`], with the cause recorded in [`RetryMeta`].
//!
//! ```rust,no_run
//! # use huginn::{RetryExecutor, RetryPolicy, HuginnError};
//! # async fn search() -> Result<Vec<String>, HuginnError> { Ok(vec![]) }
//! # async fn run() {
//! let executor = RetryExecutor::new("vector_search", RetryPolicy::new());
//! let (hits, meta) = executor.run(|| search()).await;
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{error, warn};

use crate::config::RetrySettings;
use crate::graceful::MessageContext;
use crate::telemetry;
use crate::trace::OperationTrace;
use crate::types::{Classify, DegradationLevel, ErrorClass, TelemetryRecord};
use crate::{HuginnError, Result};

/// Apology returned in place of an answer that could not be generated.
pub const ANSWER_APOLOGY: &str = "I apologize, but I'm unable to provide an answer at this moment due to a temporary service issue. Please try again.";

/// Retry budget and backoff shape.
///
/// ```rust
/// # use huginn::RetryPolicy;
/// # use std::time::Duration;
/// let policy = RetryPolicy::new()
///     .max_retries(5)
///     .initial_delay(Duration::from_millis(200))
///     .timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt. 0 = single attempt. Default: 3.
    pub max_retries: u32,
    /// Delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Multiplier applied per retry. Default: 2.0.
    pub backoff_factor: f64,
    /// Cap on any single delay. Default: 30s.
    pub max_delay: Duration,
    /// Wall-clock budget, checked before each attempt. Default: none.
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
            timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Policy from the `[retry]` config section.
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            backoff_factor: settings.backoff_factor,
            timeout: (settings.request_timeout_ms > 0)
                .then(|| Duration::from_millis(settings.request_timeout_ms)),
            ..Self::default()
        }
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Reject policies that cannot be executed.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(HuginnError::Configuration(format!(
                "backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(HuginnError::Configuration(
                "retry timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Delay before retry number `attempt + 1` (0-indexed):
    /// `initial_delay * backoff_factor^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before the next attempt; a `retry_after` hint from the failure
    /// takes precedence over the computed backoff.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Build a validated policy from the four classic retry knobs.
///
/// Invalid knobs (e.g. a backoff factor below 1) are a configuration error.
pub fn retry_with_backoff(
    max_retries: u32,
    initial_delay: Duration,
    backoff_factor: f64,
    timeout: Option<Duration>,
) -> Result<RetryPolicy> {
    let policy = RetryPolicy {
        max_retries,
        initial_delay,
        backoff_factor,
        timeout,
        ..RetryPolicy::default()
    };
    policy.validate()?;
    Ok(policy)
}

// ============================================================================
// Degraded defaults
// ============================================================================

/// Purpose tag selecting the degraded default of a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    /// Search or retrieval: degrades to an empty list.
    Search,
    /// Answer generation: degrades to an apology answer.
    Answer,
    /// Model prediction: degrades to an empty prediction with the error.
    Predict,
    #[default]
    Other,
}

impl OperationCategory {
    /// Infer the category from an operation name.
    ///
    /// `"vector_search"` → `Search`, `"generate_answer"` → `Answer`,
    /// `"predict_churn"` → `Predict`, anything else → `Other`.
    pub fn from_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("search") || name.contains("retrieve") {
            Self::Search
        } else if name.contains("answer") || name.contains("generat") {
            Self::Answer
        } else if name.contains("predict") {
            Self::Predict
        } else {
            Self::Other
        }
    }
}

/// Value handed back when a retried operation cannot produce a real one.
///
/// `message` is the technical failure message; only prediction payloads
/// carry it.
pub trait DegradedDefault: Sized {
    fn degraded_default(category: OperationCategory, message: &str) -> Self;
}

/// Answer-shaped payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub text: String,
    pub citations: Vec<Value>,
    pub used_chunks: usize,
}

/// Prediction-shaped payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionPayload {
    pub prediction: Option<Value>,
    pub probabilities: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DegradedDefault for Value {
    fn degraded_default(category: OperationCategory, message: &str) -> Self {
        match category {
            OperationCategory::Search => json!([]),
            OperationCategory::Answer => json!({
                "text": ANSWER_APOLOGY,
                "citations": [],
                "used_chunks": 0,
            }),
            OperationCategory::Predict => json!({
                "prediction": null,
                "probabilities": [],
                "error": message,
            }),
            OperationCategory::Other => Value::Null,
        }
    }
}

impl<T> DegradedDefault for Vec<T> {
    fn degraded_default(_: OperationCategory, _: &str) -> Self {
        Vec::new()
    }
}

impl<T> DegradedDefault for Option<T> {
    fn degraded_default(_: OperationCategory, _: &str) -> Self {
        None
    }
}

impl DegradedDefault for () {
    fn degraded_default(_: OperationCategory, _: &str) -> Self {}
}

impl DegradedDefault for AnswerPayload {
    fn degraded_default(_: OperationCategory, _: &str) -> Self {
        Self {
            text: ANSWER_APOLOGY.to_string(),
            ..Self::default()
        }
    }
}

impl DegradedDefault for PredictionPayload {
    fn degraded_default(_: OperationCategory, message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

/// What happened while retrying.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryMeta {
    /// Attempts made minus one.
    pub retry_count: u32,
    pub timeout_triggered: bool,
    /// Set when the returned value is a degraded default.
    pub error_class: Option<String>,
    /// Whether the returned value is a degraded default.
    pub degraded: bool,
}

impl RetryMeta {
    /// Fold into a record: retries add up; a degraded default marks the
    /// record `failed` with a fallback and a generic message.
    pub fn apply(&self, record: &mut TelemetryRecord) {
        record.retry_count = record.retry_count.saturating_add(self.retry_count);
        if let Some(class) = &self.error_class {
            record.error_class = Some(class.clone());
        }
        if self.degraded {
            record.fallback_triggered = true;
            record.raise_degradation(DegradationLevel::Failed);
            record
                .graceful_message
                .get_or_insert_with(|| MessageContext::GenericError.message().to_string());
        }
        if self.timeout_triggered {
            record
                .extensions
                .insert("timeout_triggered".into(), Value::Bool(true));
        }
    }

    /// Fold into a live trace.
    pub fn apply_to_trace(&self, trace: &mut OperationTrace) {
        trace.add_retries(self.retry_count);
        if let Some(class) = &self.error_class {
            trace.set_error_class(class.clone());
        }
        if self.degraded {
            let reason = if self.timeout_triggered { "timeout" } else { "retry_failed" };
            trace.trigger_fallback(reason);
            trace.set_degradation(
                DegradationLevel::Failed,
                MessageContext::GenericError.message(),
                None,
            );
        }
        if self.timeout_triggered {
            trace.attach_metadata([("timeout_triggered", true)]);
        }
    }

    /// Standalone record for this retry outcome.
    pub fn to_record(&self) -> TelemetryRecord {
        let mut record = TelemetryRecord::default();
        self.apply(&mut record);
        record
    }
}

/// Runs an async operation under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    name: String,
    policy: RetryPolicy,
    category: OperationCategory,
}

impl RetryExecutor {
    /// Executor for operation `name`; the category is inferred from the name.
    pub fn new(name: impl Into<String>, policy: RetryPolicy) -> Self {
        let name = name.into();
        let category = OperationCategory::from_name(&name);
        Self {
            name,
            policy,
            category,
        }
    }

    /// Override the inferred category.
    pub fn category(mut self, category: OperationCategory) -> Self {
        self.category = category;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Pair the executor with the operation it retries.
    pub fn wrap<F>(self, operation: F) -> Retrying<F> {
        Retrying {
            executor: self,
            operation,
        }
    }

    /// Run `operation` until it succeeds, fails terminally, exhausts the
    /// retry budget or runs past the timeout.
    ///
    /// The timeout is checked between attempts; an in-flight attempt is
    /// never interrupted.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> (T, RetryMeta)
    where
        T: DegradedDefault,
        E: Classify + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            if let Some(timeout) = self.policy.timeout
                && start.elapsed() > timeout
            {
                error!(
                    operation = %self.name,
                    attempts = attempt,
                    timeout_ms = timeout.as_millis() as u64,
                    "operation timed out between retries"
                );
                let message = format!("operation timed out after {}ms", timeout.as_millis());
                return self.degraded(
                    &message,
                    RetryMeta {
                        retry_count: attempt.saturating_sub(1),
                        timeout_triggered: true,
                        error_class: Some(ErrorClass::TimeoutExceeded.into()),
                        degraded: true,
                    },
                );
            }

            match operation().await {
                Ok(value) => {
                    return (
                        value,
                        RetryMeta {
                            retry_count: attempt,
                            ..RetryMeta::default()
                        },
                    );
                }
                Err(e) if e.is_transient() => {
                    if attempt < self.policy.max_retries {
                        let delay = self.policy.effective_delay(attempt, e.retry_after());
                        metrics::counter!(telemetry::RETRIES_TOTAL,
                            "operation" => self.name.clone(),
                        )
                        .increment(1);
                        warn!(
                            operation = %self.name,
                            attempt = attempt + 1,
                            max_attempts = self.policy.max_attempts(),
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying after transient error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    metrics::counter!(telemetry::RETRY_EXHAUSTED_TOTAL,
                        "operation" => self.name.clone(),
                    )
                    .increment(1);
                    error!(
                        operation = %self.name,
                        attempts = attempt + 1,
                        error = %e,
                        "retry budget exhausted"
                    );
                    return self.degraded(
                        &e.to_string(),
                        RetryMeta {
                            retry_count: attempt,
                            timeout_triggered: false,
                            error_class: Some(ErrorClass::NetworkError.into()),
                            degraded: true,
                        },
                    );
                }
                Err(e) => {
                    let class = e.class_tag();
                    error!(
                        operation = %self.name,
                        error_class = %class,
                        error = %e,
                        "non-retryable error"
                    );
                    return self.degraded(
                        &e.to_string(),
                        RetryMeta {
                            retry_count: attempt,
                            timeout_triggered: false,
                            error_class: Some(class.into_owned()),
                            degraded: true,
                        },
                    );
                }
            }
        }
    }

    /// Run inside `trace`, folding the retry outcome into it.
    pub async fn run_traced<T, E, F, Fut>(&self, trace: &mut OperationTrace, operation: F) -> T
    where
        T: DegradedDefault,
        E: Classify + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let (value, meta) = self.run(operation).await;
        meta.apply_to_trace(trace);
        value
    }

    fn degraded<T: DegradedDefault>(&self, message: &str, meta: RetryMeta) -> (T, RetryMeta) {
        (T::degraded_default(self.category, message), meta)
    }
}

/// An operation bound to its [`RetryExecutor`], callable repeatedly.
pub struct Retrying<F> {
    executor: RetryExecutor,
    operation: F,
}

impl<F> Retrying<F> {
    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Run the wrapped operation under the executor's policy.
    pub async fn call<T, E, Fut>(&mut self) -> (T, RetryMeta)
    where
        T: DegradedDefault,
        E: Classify + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.executor.run(&mut self.operation).await
    }
}

impl<F> fmt::Debug for Retrying<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrying")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
