use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::Instant;

use huginn::{
    DegradationLevel, HuginnError, OperationCategory, OperationTrace, PredictionPayload,
    RetryExecutor, RetryPolicy, retry_with_backoff,
};

/// Mock operation that fails N times then succeeds.
struct FailThenSucceed {
    fail_count: AtomicU32,
    fail_with: fn() -> HuginnError,
    total_calls: AtomicU32,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: fn() -> HuginnError) -> Self {
        Self {
            fail_count: AtomicU32::new(failures),
            fail_with,
            total_calls: AtomicU32::new(0),
        }
    }

    fn always(fail_with: fn() -> HuginnError) -> Self {
        Self::new(u32::MAX, fail_with)
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }

    async fn call(&self) -> Result<Value, HuginnError> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.fail_count.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::Relaxed);
            return Err((self.fail_with)());
        }
        Ok(json!({"answer": "ok"}))
    }
}

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(10))
}

#[tokio::test(start_paused = true)]
async fn retry_budget_bounds_attempts() {
    let mock = FailThenSucceed::always(|| HuginnError::Connection("refused".into()));
    let executor = RetryExecutor::new("vector_search", fast_policy(3));

    let (value, meta) = executor.run(|| mock.call()).await;

    assert_eq!(mock.call_count(), 4, "max_retries=3 allows 4 attempts");
    assert_eq!(value, json!([]), "search degrades to an empty list");
    assert_eq!(meta.retry_count, 3);
    assert_eq!(meta.error_class.as_deref(), Some("NETWORK_ERROR"));
    assert!(meta.degraded);
    assert!(!meta.timeout_triggered);
}

#[tokio::test]
async fn non_retryable_error_returns_prediction_default() {
    let mock = FailThenSucceed::always(|| HuginnError::Validation("feature vector is empty".into()));
    let executor = RetryExecutor::new("churn_model", fast_policy(3)).category(OperationCategory::Predict);

    let (value, meta) = executor.run(|| mock.call()).await;

    let message = HuginnError::Validation("feature vector is empty".into()).to_string();
    assert_eq!(
        value,
        json!({"prediction": null, "probabilities": [], "error": message})
    );
    assert_eq!(mock.call_count(), 1, "terminal errors are not retried");
    assert_eq!(meta.retry_count, 0);
    assert_eq!(meta.error_class.as_deref(), Some("VALIDATION_ERROR"));
}

#[tokio::test(start_paused = true)]
async fn transient_timeouts_then_success() {
    let mock = FailThenSucceed::new(2, || HuginnError::Timeout("llm took too long".into()));
    let executor = RetryExecutor::new("generate_answer", fast_policy(3));

    let (value, meta) = executor.run(|| mock.call()).await;

    assert_eq!(value, json!({"answer": "ok"}));
    assert_eq!(meta.retry_count, 2);
    assert!(!meta.degraded);
    assert!(meta.error_class.is_none());
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_exponentially() {
    let mock = FailThenSucceed::new(3, || HuginnError::Connection("reset".into()));
    let policy = RetryPolicy::new()
        .max_retries(3)
        .initial_delay(Duration::from_millis(100))
        .backoff_factor(2.0);
    let executor = RetryExecutor::new("fetch", policy);

    let start = Instant::now();
    let (_, meta) = executor.run(|| mock.call()).await;

    // 100 + 200 + 400
    assert!(start.elapsed() >= Duration::from_millis(700));
    assert!(start.elapsed() < Duration::from_millis(800));
    assert_eq!(meta.retry_count, 3);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_hint_overrides_backoff() {
    let mock = FailThenSucceed::new(1, || HuginnError::RateLimited {
        retry_after: Some(Duration::from_secs(5)),
    });
    let executor = RetryExecutor::new("fetch", fast_policy(3));

    let start = Instant::now();
    let (value, meta) = executor.run(|| mock.call()).await;

    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(start.elapsed() < Duration::from_secs(6));
    assert_eq!(value, json!({"answer": "ok"}));
    assert_eq!(meta.retry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_is_checked_between_attempts() {
    let mock = FailThenSucceed::always(|| HuginnError::Connection("refused".into()));
    let policy = RetryPolicy::new()
        .max_retries(5)
        .initial_delay(Duration::from_secs(2))
        .timeout(Duration::from_secs(1));
    let executor = RetryExecutor::new("retrieve_chunks", policy);

    let (value, meta) = executor.run(|| mock.call()).await;

    assert_eq!(mock.call_count(), 1, "the first backoff already exceeds the budget");
    assert_eq!(value, json!([]));
    assert!(meta.timeout_triggered);
    assert_eq!(meta.error_class.as_deref(), Some("TIMEOUT_EXCEEDED"));
    assert_eq!(meta.retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn io_errors_are_retryable() {
    let calls = &AtomicU32::new(0);
    let executor = RetryExecutor::new("read_index", fast_policy(2));

    let (value, meta): (Option<u8>, _) = executor
        .run(move || async move {
            if calls.fetch_add(1, Ordering::Relaxed) == 0 {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
            } else {
                Ok(Some(1))
            }
        })
        .await;

    assert_eq!(value, Some(1));
    assert_eq!(meta.retry_count, 1);
}

#[tokio::test]
async fn typed_prediction_default_carries_message() {
    let executor = RetryExecutor::new("predict_price", RetryPolicy::disabled());
    let (value, meta) = executor
        .run(|| async { Err::<PredictionPayload, _>(HuginnError::Validation("nan input".into())) })
        .await;
    assert!(value.prediction.is_none());
    assert!(value.error.unwrap().contains("nan input"));
    assert!(meta.degraded);
}

#[tokio::test(start_paused = true)]
async fn wrapper_can_be_called_repeatedly() {
    let mock = FailThenSucceed::new(1, || HuginnError::Connection("refused".into()));
    let mut retrying = RetryExecutor::new("vector_search", fast_policy(3)).wrap(|| mock.call());

    let (_, first) = retrying.call().await;
    let (_, second) = retrying.call().await;

    assert_eq!(first.retry_count, 1);
    assert_eq!(second.retry_count, 0);
    assert_eq!(retrying.executor().name(), "vector_search");
}

#[tokio::test(start_paused = true)]
async fn run_traced_folds_outcome_into_trace() {
    let mock = FailThenSucceed::always(|| HuginnError::Provider {
        status: 503,
        message: "overloaded".into(),
    });
    let executor = RetryExecutor::new("generate_answer", fast_policy(1));
    let mut trace = OperationTrace::start("rag_ask");

    let answer = executor.run_traced(&mut trace, || mock.call()).await;
    let record = trace.finish();

    assert_eq!(answer["used_chunks"], 0);
    assert_eq!(record.retry_count, 1);
    assert!(record.fallback_triggered);
    assert_eq!(record.degradation_level, DegradationLevel::Failed);
    assert_eq!(record.error_class.as_deref(), Some("NETWORK_ERROR"));
    let message = record.graceful_message.unwrap();
    assert!(!message.contains("overloaded"));
}

#[test]
fn invalid_retry_knobs_are_configuration_errors() {
    let err = retry_with_backoff(3, Duration::from_millis(100), 0.0, None).unwrap_err();
    assert!(matches!(err, HuginnError::Configuration(_)));
}
