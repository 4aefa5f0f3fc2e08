//! Telemetry merging for operations composed of several sub-operations.
//!
//! Field rules, applied across all inputs in order:
//!
//! | Fields | Rule |
//! |---|---|
//! | `latency_ms_*`, `retry_count` | sum |
//! | `cache_hit`, `fallback_triggered` | logical OR |
//! | `degradation_level` | worst ([`DegradationLevel::worse`]) |
//! | everything else, extensions included | last non-null value |
//!
//! Maps are merged raw and completed once, so an explicit `0.0` confidence
//! overwrites an earlier score and a bare `fallback_reason` never replaces
//! an earlier graceful message. Typed records carry no presence
//! information; [`merge_records`] treats field defaults as unset.

use serde_json::Value;

use crate::types::{DegradationLevel, TelemetryMap, TelemetryRecord, UNKNOWN_ROUTING};

use super::complete::{as_u64, ensure_complete, remap_legacy};

const STEP_FIELDS: [&str; 3] = ["latency_ms_retrieval", "latency_ms_embedding", "latency_ms_llm"];
const SUMMED_FIELDS: [&str; 5] = [
    "latency_ms_total",
    "latency_ms_retrieval",
    "latency_ms_embedding",
    "latency_ms_llm",
    "retry_count",
];
const OR_FIELDS: [&str; 2] = ["cache_hit", "fallback_triggered"];

/// Merge typed records. An empty input yields the default record.
///
/// The result is passed through the completer, so it is always complete.
pub fn merge_records<'a>(records: impl IntoIterator<Item = &'a TelemetryRecord>) -> TelemetryRecord {
    let mut merged = TelemetryRecord::default();

    for record in records {
        merged.latency_ms_total = merged.latency_ms_total.saturating_add(record.latency_ms_total);
        merged.latency_ms_retrieval = merged
            .latency_ms_retrieval
            .saturating_add(record.latency_ms_retrieval);
        merged.latency_ms_embedding = merged
            .latency_ms_embedding
            .saturating_add(record.latency_ms_embedding);
        merged.latency_ms_llm = merged.latency_ms_llm.saturating_add(record.latency_ms_llm);
        merged.retry_count = merged.retry_count.saturating_add(record.retry_count);

        merged.cache_hit |= record.cache_hit;
        merged.fallback_triggered |= record.fallback_triggered;

        merged.raise_degradation(record.degradation_level);

        if record.routing_decision != UNKNOWN_ROUTING && !record.routing_decision.is_empty() {
            merged.routing_decision.clone_from(&record.routing_decision);
        }
        if record.confidence_score != 0.0 {
            merged.confidence_score = record.confidence_score;
        }
        if record.graceful_message.is_some() {
            merged.graceful_message.clone_from(&record.graceful_message);
        }
        if record.fallback_reason.is_some() {
            merged.fallback_reason.clone_from(&record.fallback_reason);
        }
        if record.error_class.is_some() {
            merged.error_class.clone_from(&record.error_class);
        }
        for (key, value) in &record.extensions {
            if !value.is_null() {
                merged.extensions.insert(key.clone(), value.clone());
            }
        }
    }

    ensure_complete(Some(&merged.to_map()))
}

/// Merge partial telemetry maps.
///
/// Legacy names are remapped per input. An input without `latency_ms_total`
/// contributes the sum of its step latencies. Null and empty-string values
/// count as absent. The merged map is completed once, so an empty input
/// yields `ensure_complete(None)`.
pub fn merge_telemetry<'a>(maps: impl IntoIterator<Item = &'a TelemetryMap>) -> TelemetryRecord {
    let mut merged = TelemetryMap::new();
    let mut sums = [0u64; SUMMED_FIELDS.len()];
    let mut flags = [false; OR_FIELDS.len()];
    let mut level = DegradationLevel::None;

    for map in maps {
        let mut map = map.clone();
        remap_legacy(&mut map);

        let read = |key: &str| map.get(key).filter(|v| !v.is_null()).and_then(as_u64);
        for (sum, field) in sums.iter_mut().zip(SUMMED_FIELDS) {
            let value = match field {
                "latency_ms_total" => read(field).unwrap_or_else(|| {
                    STEP_FIELDS
                        .into_iter()
                        .filter_map(|step| read(step))
                        .fold(0, u64::saturating_add)
                }),
                _ => read(field).unwrap_or(0),
            };
            *sum = sum.saturating_add(value);
        }
        for (flag, field) in flags.iter_mut().zip(OR_FIELDS) {
            *flag |= map.get(field).and_then(Value::as_bool).unwrap_or(false);
        }
        if let Some(token) = map.get("degradation_level").and_then(Value::as_str) {
            level = level.worse(DegradationLevel::parse_lenient(token));
        }

        for (key, value) in map {
            let key = key.as_str();
            if SUMMED_FIELDS.contains(&key) || OR_FIELDS.contains(&key) || key == "degradation_level" {
                continue;
            }
            if value.is_null() || value.as_str().is_some_and(str::is_empty) {
                continue;
            }
            merged.insert(key.to_string(), value);
        }
    }

    for (sum, field) in sums.into_iter().zip(SUMMED_FIELDS) {
        merged.insert(field.to_string(), Value::from(sum));
    }
    for (flag, field) in flags.into_iter().zip(OR_FIELDS) {
        merged.insert(field.to_string(), Value::from(flag));
    }
    merged.insert("degradation_level".into(), Value::from(level.as_str()));

    ensure_complete(Some(&merged))
}

impl TelemetryRecord {
    /// Merge `other` into a copy of `self` (see [`merge_records`]).
    pub fn merged_with(&self, other: &TelemetryRecord) -> TelemetryRecord {
        merge_records([self, other])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DegradationLevel;
    use serde_json::{Value, json};

    fn obj(value: Value) -> TelemetryMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn empty_input_is_default() {
        assert_eq!(merge_telemetry(std::iter::empty()), TelemetryRecord::default());
        assert_eq!(merge_records(std::iter::empty()), TelemetryRecord::default());
    }

    #[test]
    fn sums_ors_and_last_wins() {
        let a = obj(json!({
            "latency_ms_total": 100,
            "latency_ms_llm": 80,
            "retry_count": 1,
            "cache_hit": false,
            "routing_decision": "semantic_search",
            "confidence_score": 0.9
        }));
        let b = obj(json!({
            "latency_ms_total": 50,
            "latency_ms_llm": 20,
            "retry_count": 2,
            "cache_hit": true,
            "confidence_score": 0.4
        }));
        let merged = merge_telemetry([&a, &b]);
        assert_eq!(merged.latency_ms_total, 150);
        assert_eq!(merged.latency_ms_llm, 100);
        assert_eq!(merged.retry_count, 3);
        assert!(merged.cache_hit);
        // b never set a routing decision, so a's survives
        assert_eq!(merged.routing_decision, "semantic_search");
        assert_eq!(merged.confidence_score, 0.4);
    }

    #[test]
    fn worst_degradation_wins() {
        let a = obj(json!({"degradation_level": "fallback"}));
        let b = obj(json!({"degradation_level": "mild"}));
        assert_eq!(
            merge_telemetry([&a, &b]).degradation_level,
            DegradationLevel::Fallback
        );
    }

    #[test]
    fn extensions_last_non_null_wins() {
        let a = obj(json!({"chunks": 3, "model": "small"}));
        let b = obj(json!({"chunks": 7, "model": null}));
        let merged = merge_telemetry([&a, &b]);
        assert_eq!(merged.extensions["chunks"], json!(7));
        assert_eq!(merged.extensions["model"], json!("small"));
    }

    #[test]
    fn merged_with_is_pairwise_merge() {
        let mut a = TelemetryRecord::new();
        a.latency_ms_total = 10;
        let mut b = TelemetryRecord::new();
        b.latency_ms_total = 5;
        b.error_class = Some("NETWORK_ERROR".into());
        let merged = a.merged_with(&b);
        assert_eq!(merged.latency_ms_total, 15);
        assert_eq!(merged.error_class.as_deref(), Some("NETWORK_ERROR"));
    }
}
