//! Telemetry completion: any partial or legacy map in, a complete record out.

use serde_json::Value;
use tracing::debug;

use crate::types::{
    CANONICAL_FIELDS, DegradationLevel, TelemetryMap, TelemetryRecord, UNKNOWN_ROUTING,
    clamp_confidence,
};

/// Legacy field names and the canonical field each one stands in for.
pub const LEGACY_ALIASES: [(&str, &str); 7] = [
    ("latency_ms", "latency_ms_total"),
    ("mode", "routing_decision"),
    ("confidence_top", "confidence_score"),
    ("cache_used", "cache_hit"),
    ("retries", "retry_count"),
    ("fallback_used", "fallback_triggered"),
    ("degradation", "degradation_level"),
];

/// Prefix of the graceful message synthesized from a bare fallback reason.
const SYNTHESIZED_MESSAGE_PREFIX: &str = "Degraded: ";

/// Complete a possibly-missing, possibly-partial telemetry map.
///
/// - `None` is treated as an empty map.
/// - Legacy names ([`LEGACY_ALIASES`]) fill their canonical field when the
///   canonical one is absent; the legacy keys themselves are consumed.
/// - Absent fields get their defaults. An absent `latency_ms_total` is the
///   sum of the three sub-step latencies.
/// - Unrecognized degradation tokens become `none`; confidence is clamped.
/// - An empty graceful message with a fallback reason present becomes
///   `"Degraded: <reason>"`.
///
/// Never fails: malformed values fall back to the field default.
pub fn ensure_complete(partial: Option<&TelemetryMap>) -> TelemetryRecord {
    let mut map = partial.cloned().unwrap_or_default();
    remap_legacy(&mut map);

    let mut record = TelemetryRecord {
        latency_ms_retrieval: take_u64(&mut map, "latency_ms_retrieval"),
        latency_ms_embedding: take_u64(&mut map, "latency_ms_embedding"),
        latency_ms_llm: take_u64(&mut map, "latency_ms_llm"),
        ..TelemetryRecord::default()
    };

    record.latency_ms_total = match map.remove("latency_ms_total") {
        Some(value) if !value.is_null() => as_u64(&value).unwrap_or(0),
        _ => record.step_latency_sum(),
    };
    record.routing_decision =
        take_string(&mut map, "routing_decision").unwrap_or_else(|| UNKNOWN_ROUTING.to_string());
    record.confidence_score = map
        .remove("confidence_score")
        .and_then(|v| v.as_f64())
        .map(clamp_confidence)
        .unwrap_or(0.0);
    record.cache_hit = take_bool(&mut map, "cache_hit");
    record.retry_count = u32::try_from(take_u64(&mut map, "retry_count")).unwrap_or(u32::MAX);
    record.fallback_triggered = take_bool(&mut map, "fallback_triggered");
    record.degradation_level = map
        .remove("degradation_level")
        .and_then(|v| v.as_str().map(DegradationLevel::parse_lenient))
        .unwrap_or_default();
    record.graceful_message = take_string(&mut map, "graceful_message");
    record.fallback_reason = take_string(&mut map, "fallback_reason");
    record.error_class = take_string(&mut map, "error_class");

    if record.graceful_message.is_none()
        && let Some(reason) = &record.fallback_reason
    {
        record.graceful_message = Some(format!("{SYNTHESIZED_MESSAGE_PREFIX}{reason}"));
    }

    record.extensions = map;
    record
}

/// Map form of [`ensure_complete`]: the contract handed to downstream
/// consumers (API responses, export builders).
pub fn ensure_complete_telemetry(partial: Option<&TelemetryMap>) -> TelemetryMap {
    ensure_complete(partial).to_map()
}

/// Complete an arbitrary JSON value. Non-objects count as empty input.
pub fn ensure_complete_value(value: &Value) -> TelemetryRecord {
    ensure_complete(value.as_object())
}

/// Bridge trace-shaped telemetry and legacy maps to a standard record.
///
/// Maps carrying `operation_name` are read as finished traces: their
/// `duration_ms` becomes `latency_ms_total` and `component` stands in for a
/// missing routing decision. Anything else goes through [`ensure_complete`].
/// The component is recorded as the `component` extension field.
pub fn extract_standard_telemetry(source: &TelemetryMap, component: &str) -> TelemetryRecord {
    let Some(operation) = source.get("operation_name") else {
        return ensure_complete(Some(source));
    };

    let mut map = TelemetryMap::new();
    for field in CANONICAL_FIELDS {
        if let Some(value) = source.get(field)
            && !value.is_null()
        {
            map.insert(field.to_string(), value.clone());
        }
    }
    map.insert(
        "latency_ms_total".into(),
        source.get("duration_ms").cloned().unwrap_or(Value::from(0)),
    );
    map.entry("routing_decision")
        .or_insert_with(|| Value::from(component));
    map.insert("component".into(), Value::from(component));
    debug!(
        component,
        operation = operation.as_str().unwrap_or_default(),
        "extracted standard telemetry from trace"
    );
    ensure_complete(Some(&map))
}

/// Total latency from optional component latencies.
///
/// `compute_total_latency([Some(100), Some(50), None, Some(25)]) == 175`
pub fn compute_total_latency(parts: impl IntoIterator<Item = Option<u64>>) -> u64 {
    parts.into_iter().flatten().fold(0u64, u64::saturating_add)
}

/// Move legacy aliases onto their canonical names (consuming the alias).
pub(crate) fn remap_legacy(map: &mut TelemetryMap) {
    for (legacy, canonical) in LEGACY_ALIASES {
        if let Some(value) = map.remove(legacy) {
            let canonical_missing = map.get(canonical).is_none_or(Value::is_null);
            if canonical_missing {
                map.insert(canonical.to_string(), value);
            }
        }
    }
}

/// Lenient non-negative integer read: floats are rounded, negatives clamp to 0.
pub(crate) fn as_u64(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if value.as_i64().is_some() {
        return Some(0);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.max(0.0).round() as u64)
}

fn take_u64(map: &mut TelemetryMap, key: &str) -> u64 {
    map.remove(key).as_ref().and_then(as_u64).unwrap_or(0)
}

fn take_bool(map: &mut TelemetryMap, key: &str) -> bool {
    map.remove(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Read a non-empty string field. Scalars are stringified; null, empty
/// strings and containers count as absent.
fn take_string(map: &mut TelemetryMap, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
