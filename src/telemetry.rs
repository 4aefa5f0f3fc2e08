//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: traced operation name (e.g. "rag_ask", "embed_chunks")
//! - `component`: platform component (e.g. "rag_search", "csv_insights")
//! - `degradation`: final degradation level ("none" … "failed")
//! - `cache`: cache name ("rag", "embedding", "ml")

use std::time::Duration;

use crate::types::TelemetryRecord;

/// Total finalized operations.
///
/// Labels: `operation`, `degradation`.
pub const OPERATIONS_TOTAL: &str = "huginn_operations_total";

/// Operation duration in seconds.
///
/// Labels: `operation`.
pub const OPERATION_DURATION_SECONDS: &str = "huginn_operation_duration_seconds";

/// Total retry attempts (not counting the initial attempt).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "huginn_retries_total";

/// Total operations whose retry budget ran out.
///
/// Labels: `operation`.
pub const RETRY_EXHAUSTED_TOTAL: &str = "huginn_retry_exhausted_total";

/// Total fallbacks triggered by handlers and wrappers.
///
/// Labels: `component`, `reason`.
pub const FALLBACKS_TOTAL: &str = "huginn_fallbacks_total";

/// Total cache hits.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total cache misses.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Emit the per-operation counter and duration histogram for a finalized record.
pub(crate) fn record_operation(operation: &str, record: &TelemetryRecord) {
    metrics::counter!(OPERATIONS_TOTAL,
        "operation" => operation.to_owned(),
        "degradation" => record.degradation_level.as_str(),
    )
    .increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => operation.to_owned())
        .record(Duration::from_millis(record.latency_ms_total).as_secs_f64());
}

pub(crate) fn record_fallback(component: &str, reason: &str) {
    metrics::counter!(FALLBACKS_TOTAL,
        "component" => component.to_owned(),
        "reason" => reason.to_owned(),
    )
    .increment(1);
}
