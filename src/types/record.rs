//! The canonical telemetry record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DegradationLevel;

/// A partial or complete telemetry record in its plain-map wire form.
pub type TelemetryMap = serde_json::Map<String, Value>;

/// Routing decision reported when no code path was named.
pub const UNKNOWN_ROUTING: &str = "unknown";

/// Every canonical field, in wire order.
pub const CANONICAL_FIELDS: [&str; 13] = [
    "latency_ms_total",
    "latency_ms_retrieval",
    "latency_ms_embedding",
    "latency_ms_llm",
    "routing_decision",
    "confidence_score",
    "cache_hit",
    "retry_count",
    "fallback_triggered",
    "degradation_level",
    "graceful_message",
    "fallback_reason",
    "error_class",
];

/// The single structure every operation emits.
///
/// Serializes to a flat JSON object: the canonical fields followed by any
/// caller-specific extension fields. Deserializing goes through
/// [`ensure_complete`](crate::ensure_complete), so any JSON object is
/// accepted: legacy names are remapped and malformed values take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TelemetryMap")]
pub struct TelemetryRecord {
    /// Wall-clock duration of the whole operation.
    pub latency_ms_total: u64,
    pub latency_ms_retrieval: u64,
    pub latency_ms_embedding: u64,
    pub latency_ms_llm: u64,
    /// Which code path or strategy served the request.
    pub routing_decision: String,
    /// Result quality in `[0, 1]`.
    pub confidence_score: f64,
    pub cache_hit: bool,
    pub retry_count: u32,
    pub fallback_triggered: bool,
    pub degradation_level: DegradationLevel,
    /// User-facing explanation. Only meaningful when degraded.
    pub graceful_message: Option<String>,
    /// Technical cause of a fallback. Never shown to end users.
    pub fallback_reason: Option<String>,
    pub error_class: Option<String>,
    /// Caller-specific fields outside the canonical set.
    #[serde(flatten)]
    pub extensions: TelemetryMap,
}

impl Default for TelemetryRecord {
    fn default() -> Self {
        Self {
            latency_ms_total: 0,
            latency_ms_retrieval: 0,
            latency_ms_embedding: 0,
            latency_ms_llm: 0,
            routing_decision: UNKNOWN_ROUTING.to_string(),
            confidence_score: 0.0,
            cache_hit: false,
            retry_count: 0,
            fallback_triggered: false,
            degradation_level: DegradationLevel::None,
            graceful_message: None,
            fallback_reason: None,
            error_class: None,
            extensions: TelemetryMap::new(),
        }
    }
}

impl TelemetryRecord {
    /// A record with every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of the three named sub-step latencies.
    pub fn step_latency_sum(&self) -> u64 {
        self.latency_ms_retrieval
            .saturating_add(self.latency_ms_embedding)
            .saturating_add(self.latency_ms_llm)
    }

    /// Set the confidence score, clamped to `[0, 1]`.
    pub fn set_confidence(&mut self, score: f64) {
        self.confidence_score = clamp_confidence(score);
    }

    /// Raise the degradation level; never lowers it.
    pub fn raise_degradation(&mut self, level: DegradationLevel) {
        self.degradation_level = self.degradation_level.worse(level);
    }

    /// Whether the record reports any degradation.
    pub fn is_degraded(&self) -> bool {
        self.degradation_level.is_degraded()
    }

    /// Full wire form: every canonical field plus extensions.
    pub fn to_map(&self) -> TelemetryMap {
        let mut map = TelemetryMap::new();
        map.insert("latency_ms_total".into(), self.latency_ms_total.into());
        map.insert("latency_ms_retrieval".into(), self.latency_ms_retrieval.into());
        map.insert("latency_ms_embedding".into(), self.latency_ms_embedding.into());
        map.insert("latency_ms_llm".into(), self.latency_ms_llm.into());
        map.insert(
            "routing_decision".into(),
            self.routing_decision.clone().into(),
        );
        map.insert("confidence_score".into(), self.confidence_score.into());
        map.insert("cache_hit".into(), self.cache_hit.into());
        map.insert("retry_count".into(), self.retry_count.into());
        map.insert("fallback_triggered".into(), self.fallback_triggered.into());
        map.insert(
            "degradation_level".into(),
            self.degradation_level.as_str().into(),
        );
        map.insert("graceful_message".into(), self.graceful_message.clone().into());
        map.insert("fallback_reason".into(), self.fallback_reason.clone().into());
        map.insert("error_class".into(), self.error_class.clone().into());
        for (key, value) in &self.extensions {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        map
    }

    /// Wire form restricted to fields that differ from their defaults.
    ///
    /// Used when merging typed records, so that an untouched default in a
    /// later record never overwrites information from an earlier one.
    pub fn to_sparse_map(&self) -> TelemetryMap {
        let defaults = TelemetryRecord::default().to_map();
        self.to_map()
            .into_iter()
            .filter(|(key, value)| !value.is_null() && defaults.get(key) != Some(value))
            .collect()
    }
}

/// Clamp a confidence score to `[0, 1]`. `NaN` becomes `0.0`.
pub fn clamp_confidence(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

impl From<TelemetryMap> for TelemetryRecord {
    fn from(map: TelemetryMap) -> Self {
        crate::standards::ensure_complete(Some(&map))
    }
}
