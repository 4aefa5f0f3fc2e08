//! Per-call operation traces.
//!
//! An [`OperationTrace`] is the mutable builder for one [`TelemetryRecord`]
//! across a single logical operation. It is created at operation entry,
//! mutated by [`record_step`](OperationTrace::record_step) and
//! [`attach_metadata`](OperationTrace::attach_metadata), and consumed by
//! [`finish`](OperationTrace::finish) /
//! [`finish_with_error`](OperationTrace::finish_with_error), so finalization
//! happens exactly once.
//!
//! Traces are owned by the call frame that created them and are deliberately
//! not `Sync`-shared: concurrent branches each start their own trace and
//! merge the finished records (see [`join_traced`](crate::resilience::join_traced)).
//!
//! ```rust
//! use huginn::OperationTrace;
//!
//! let mut trace = OperationTrace::start("rag_ask");
//! trace.record_step("retrieval", 120);
//! trace.record_step("llm", 800);
//! trace.set_routing("semantic_search");
//! let record = trace.finish();
//! assert_eq!(record.latency_ms_total, 920);
//! ```

mod response;

pub use response::{Envelope, finalize_response};

use std::borrow::Cow;
use std::future::Future;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::graceful;
use crate::standards::{LEGACY_ALIASES, as_u64};
use crate::telemetry;
use crate::types::{
    Classify, ComponentType, DegradationLevel, TelemetryMap, TelemetryRecord, clamp_confidence,
};

/// Latency recorded for one named step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTiming {
    pub name: String,
    pub latency_ms: u64,
}

/// Mutable span for one operation. See the [module docs](self).
#[derive(Debug)]
pub struct OperationTrace {
    name: String,
    component: Option<ComponentType>,
    started: Instant,
    steps: Vec<StepTiming>,
    record: TelemetryRecord,
    total_explicit: bool,
}

impl OperationTrace {
    /// Start a trace for `name`.
    pub fn start(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(operation = %name, "trace started");
        Self {
            name,
            component: None,
            started: Instant::now(),
            steps: Vec::new(),
            record: TelemetryRecord::default(),
            total_explicit: false,
        }
    }

    /// Start a trace for a platform component; the trace is named after it.
    pub fn for_component(component: ComponentType) -> Self {
        let mut trace = Self::start(component.as_str());
        trace.component = Some(component);
        trace
    }

    /// Run `f` inside a fresh trace, finalizing on exit for both outcomes.
    ///
    /// The closure's error is returned untouched alongside the record; on
    /// error the record carries its class tag and at least `failed`.
    pub fn scope<T, E, F>(name: impl Into<String>, f: F) -> (Result<T, E>, TelemetryRecord)
    where
        E: Classify,
        F: FnOnce(&mut OperationTrace) -> Result<T, E>,
    {
        let mut trace = Self::start(name);
        let outcome = f(&mut trace);
        let record = trace.finalize(&outcome);
        (outcome, record)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self) -> Option<ComponentType> {
        self.component
    }

    /// Steps recorded so far, in first-recorded order.
    pub fn steps(&self) -> &[StepTiming] {
        &self.steps
    }

    /// Milliseconds since the trace started.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Current, non-finalized view of the record.
    pub fn snapshot(&self) -> &TelemetryRecord {
        &self.record
    }

    /// Record a step latency.
    ///
    /// `retrieval`, `embedding` and `llm` feed the matching `latency_ms_*`
    /// field. Unless the caller set `latency_ms_total` explicitly, the total is
    /// recomputed as the sum of those three.
    pub fn record_step(&mut self, step: &str, latency_ms: u64) {
        match self.steps.iter_mut().find(|s| s.name == step) {
            Some(existing) => existing.latency_ms = latency_ms,
            None => self.steps.push(StepTiming {
                name: step.to_string(),
                latency_ms,
            }),
        }

        match step {
            "retrieval" => self.record.latency_ms_retrieval = latency_ms,
            "embedding" => self.record.latency_ms_embedding = latency_ms,
            "llm" => self.record.latency_ms_llm = latency_ms,
            _ => {}
        }
        self.recompute_total();

        debug!(operation = %self.name, step, latency_ms, "step recorded");
    }

    /// Attach metadata. Null values are ignored; everything else overwrites.
    ///
    /// Canonical (and legacy) field names update the typed record; any other
    /// key lands in the extension map. Setting `latency_ms_total` pins the
    /// total so later steps no longer recompute it.
    pub fn attach_metadata<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            let value = value.into();
            if value.is_null() {
                continue;
            }
            let key = key.into();
            let key = LEGACY_ALIASES
                .iter()
                .find(|(legacy, _)| *legacy == key)
                .map(|(_, canonical)| (*canonical).to_string())
                .unwrap_or(key);
            self.apply_field(key, value);
        }
    }

    fn apply_field(&mut self, key: String, value: Value) {
        let record = &mut self.record;
        match key.as_str() {
            "latency_ms_total" => {
                if let Some(total) = as_u64(&value) {
                    record.latency_ms_total = total;
                    self.total_explicit = true;
                }
            }
            "latency_ms_retrieval" | "latency_ms_embedding" | "latency_ms_llm" => {
                let latency = as_u64(&value).unwrap_or(0);
                match key.as_str() {
                    "latency_ms_retrieval" => record.latency_ms_retrieval = latency,
                    "latency_ms_embedding" => record.latency_ms_embedding = latency,
                    _ => record.latency_ms_llm = latency,
                }
                self.recompute_total();
            }
            "routing_decision" => {
                if let Some(routing) = value_to_string(value) {
                    record.routing_decision = routing;
                }
            }
            "confidence_score" => {
                if let Some(score) = value.as_f64() {
                    record.confidence_score = clamp_confidence(score);
                }
            }
            "cache_hit" => record.cache_hit = value.as_bool().unwrap_or(record.cache_hit),
            "fallback_triggered" => {
                record.fallback_triggered = value.as_bool().unwrap_or(record.fallback_triggered)
            }
            "retry_count" => {
                if let Some(count) = as_u64(&value) {
                    record.retry_count = u32::try_from(count).unwrap_or(u32::MAX);
                }
            }
            "degradation_level" => {
                if let Some(token) = value.as_str() {
                    record.degradation_level = DegradationLevel::parse_lenient(token);
                }
            }
            "graceful_message" => record.graceful_message = value_to_string(value),
            "fallback_reason" => record.fallback_reason = value_to_string(value),
            "error_class" => record.error_class = value_to_string(value),
            _ => {
                record.extensions.insert(key, value);
            }
        }
    }

    fn recompute_total(&mut self) {
        if !self.total_explicit {
            self.record.latency_ms_total = self.record.step_latency_sum();
        }
    }

    pub fn set_routing(&mut self, routing: impl Into<String>) {
        self.record.routing_decision = routing.into();
    }

    /// Set the confidence score, clamped to `[0, 1]`.
    pub fn set_confidence(&mut self, score: f64) {
        self.record.set_confidence(score);
    }

    pub fn set_cache_hit(&mut self, hit: bool) {
        self.record.cache_hit = hit;
    }

    pub fn increment_retry(&mut self) {
        self.add_retries(1);
    }

    pub fn add_retries(&mut self, retries: u32) {
        self.record.retry_count = self.record.retry_count.saturating_add(retries);
    }

    pub fn set_error_class(&mut self, class: impl Into<String>) {
        self.record.error_class = Some(class.into());
    }

    pub fn set_graceful_message(&mut self, message: impl Into<String>) {
        self.record.graceful_message = Some(message.into());
    }

    /// Raise the degradation level (worse wins; never lowers).
    pub fn raise_degradation(&mut self, level: DegradationLevel) {
        self.record.raise_degradation(level);
    }

    /// Mark that a fallback path was taken, with its technical reason.
    pub fn trigger_fallback(&mut self, reason: &str) {
        self.record.fallback_triggered = true;
        self.record.fallback_reason = Some(reason.to_string());
        let component = self.component.map_or(self.name.as_str(), |c| c.as_str());
        telemetry::record_fallback(component, reason);
        warn!(operation = %self.name, component, reason, "fallback triggered");
    }

    /// Raise degradation to `level` with a user-facing message and an
    /// optional technical reason.
    pub fn set_degradation(&mut self, level: DegradationLevel, message: &str, reason: Option<&str>) {
        self.record.raise_degradation(level);
        self.record.graceful_message = Some(message.to_string());
        if let Some(reason) = reason {
            self.record.fallback_reason = Some(reason.to_string());
        }
        info!(
            operation = %self.name,
            degradation = %level,
            reason = reason.unwrap_or_default(),
            "degradation set"
        );
    }

    /// Fold telemetry reported by an external call into this trace.
    ///
    /// Sub-step latencies are summed; the worse degradation wins and brings
    /// its graceful message; retry counts add up; any other non-null field
    /// overwrites.
    pub fn merge_external(&mut self, external: &TelemetryMap) {
        let mut external = external.clone();
        crate::standards::remap_legacy(&mut external);

        for (field, slot) in [
            ("latency_ms_retrieval", &mut self.record.latency_ms_retrieval),
            ("latency_ms_embedding", &mut self.record.latency_ms_embedding),
            ("latency_ms_llm", &mut self.record.latency_ms_llm),
        ] {
            if let Some(latency) = external.remove(field).as_ref().and_then(as_u64) {
                *slot = slot.saturating_add(latency);
            }
        }
        self.recompute_total();

        if let Some(retries) = external.remove("retry_count").as_ref().and_then(as_u64) {
            self.add_retries(u32::try_from(retries).unwrap_or(u32::MAX));
        }

        let incoming = external
            .remove("degradation_level")
            .and_then(|v| v.as_str().map(DegradationLevel::parse_lenient))
            .unwrap_or_default();
        let message = external.remove("graceful_message");
        if incoming > self.record.degradation_level {
            self.record.degradation_level = incoming;
            if let Some(message) = message.and_then(value_to_string) {
                self.record.graceful_message = Some(message);
            }
        }

        // An external total describes the external call, not this operation.
        external.remove("latency_ms_total");
        self.attach_metadata(external);
    }

    /// Run a fallible step without letting its failure escape.
    ///
    /// The step latency is recorded either way. On failure the trace gets
    /// `fallback_triggered`, degradation of at least `fallback`, the error's
    /// class tag and (optionally) `fallback_message`; `fallback_value` is
    /// returned in place of the step's result.
    pub fn safe_try<T, E, F>(
        &mut self,
        step: &str,
        f: F,
        fallback_value: T,
        fallback_message: Option<&str>,
    ) -> T
    where
        E: Classify + std::fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        let step_start = Instant::now();
        let outcome = f();
        self.record_step(step, step_start.elapsed().as_millis() as u64);
        self.absorb_step_outcome(step, outcome, fallback_value, fallback_message)
    }

    /// Async form of [`safe_try`](Self::safe_try).
    pub async fn safe_try_async<T, E, Fut>(
        &mut self,
        step: &str,
        fut: Fut,
        fallback_value: T,
        fallback_message: Option<&str>,
    ) -> T
    where
        E: Classify + std::fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let step_start = Instant::now();
        let outcome = fut.await;
        self.record_step(step, step_start.elapsed().as_millis() as u64);
        self.absorb_step_outcome(step, outcome, fallback_value, fallback_message)
    }

    fn absorb_step_outcome<T, E>(
        &mut self,
        step: &str,
        outcome: Result<T, E>,
        fallback_value: T,
        fallback_message: Option<&str>,
    ) -> T
    where
        E: Classify + std::fmt::Display,
    {
        match outcome {
            Ok(value) => value,
            Err(e) => {
                warn!(operation = %self.name, step, error = %e, "step failed, using fallback value");
                self.record.fallback_triggered = true;
                self.record.raise_degradation(DegradationLevel::Fallback);
                self.record.error_class = Some(e.class_tag().into_owned());
                if let Some(message) = fallback_message {
                    self.record.graceful_message = Some(message.to_string());
                }
                fallback_value
            }
        }
    }

    /// Finalize a successful operation.
    pub fn finish(self) -> TelemetryRecord {
        self.seal(None)
    }

    /// Finalize an operation that ended with `error`.
    ///
    /// Sets `error_class` to the error's tag and raises a still-clean
    /// degradation level to `failed`.
    pub fn finish_with_error<E: Classify + ?Sized>(self, error: &E) -> TelemetryRecord {
        self.seal(Some(error.class_tag()))
    }

    /// Finalize from an operation outcome.
    pub fn finalize<T, E: Classify>(self, outcome: &Result<T, E>) -> TelemetryRecord {
        match outcome {
            Ok(_) => self.finish(),
            Err(e) => self.finish_with_error(e),
        }
    }

    fn seal(mut self, error_class: Option<Cow<'static, str>>) -> TelemetryRecord {
        let success = error_class.is_none();

        if self.record.latency_ms_total == 0 && !self.total_explicit {
            self.record.latency_ms_total = self.elapsed_ms();
        }

        if let Some(class) = error_class {
            self.record.error_class = Some(class.into_owned());
            if self.record.degradation_level == DegradationLevel::None {
                self.record.degradation_level = DegradationLevel::Failed;
            }
        }

        if self.record.is_degraded() && self.record.graceful_message.is_none() {
            self.record.graceful_message = Some(match &self.record.fallback_reason {
                Some(reason) => format!("Degraded: {reason}"),
                None => graceful::default_message(self.record.degradation_level).to_string(),
            });
        }

        info!(
            operation = %self.name,
            success,
            latency_ms = self.record.latency_ms_total,
            degradation = %self.record.degradation_level,
            "trace completed"
        );
        telemetry::record_operation(&self.name, &self.record);
        self.record
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
