//! Response envelopes: a payload plus its telemetry under `meta`.

use serde::{Deserialize, Serialize};

use crate::types::{DegradationLevel, TelemetryRecord};

/// A response payload with its finalized telemetry.
///
/// The payload's own fields are flattened into the top-level object, so a
/// struct payload serializes as `{ ...payload fields, "meta": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(flatten)]
    pub payload: T,
    pub meta: TelemetryRecord,
}

impl<T> Envelope<T> {
    pub fn new(payload: T, meta: TelemetryRecord) -> Self {
        Self { payload, meta }
    }

    pub fn is_degraded(&self) -> bool {
        self.meta.is_degraded()
    }

    pub fn into_parts(self) -> (T, TelemetryRecord) {
        (self.payload, self.meta)
    }
}

/// Wrap a payload and its record, optionally overriding the graceful message
/// and degradation level last-minute (e.g. after post-processing noticed an
/// empty answer).
pub fn finalize_response<T>(
    payload: T,
    mut meta: TelemetryRecord,
    graceful_message: Option<&str>,
    degradation: Option<DegradationLevel>,
) -> Envelope<T> {
    if let Some(message) = graceful_message {
        meta.graceful_message = Some(message.to_string());
    }
    if let Some(level) = degradation {
        meta.degradation_level = level;
    }
    Envelope::new(payload, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Answer {
        text: String,
        citations: Vec<String>,
    }

    #[test]
    fn payload_fields_are_flattened() {
        let envelope = finalize_response(
            Answer {
                text: "42".into(),
                citations: vec![],
            },
            TelemetryRecord::default(),
            None,
            None,
        );
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["text"], json!("42"));
        assert_eq!(value["meta"]["routing_decision"], json!("unknown"));
    }

    #[test]
    fn overrides_apply() {
        let envelope = finalize_response(
            json!({"items": []}),
            TelemetryRecord::default(),
            Some("No matching documents were found."),
            Some(DegradationLevel::Mild),
        );
        assert!(envelope.is_degraded());
        assert_eq!(
            envelope.meta.graceful_message.as_deref(),
            Some("No matching documents were found.")
        );
    }
}
