use std::time::Duration;

use serde_json::{Value, json};

use huginn::{
    ComponentType, DegradationLevel, HuginnError, TelemetryMap, resilient_operation,
    with_timeout_fallback,
};

fn telemetry(value: Value) -> TelemetryMap {
    value.as_object().cloned().unwrap_or_default()
}

async fn answer_question(fail: bool) -> Result<(String, TelemetryMap), HuginnError> {
    if fail {
        return Err(HuginnError::Connection("vector store refused".into()));
    }
    Ok((
        "Huginn flies over the world each day.".to_string(),
        telemetry(json!({
            "latency_ms_retrieval": 30,
            "latency_ms_llm": 120,
            "routing_decision": "semantic_search",
            "confidence_score": 0.87
        })),
    ))
}

#[tokio::test]
async fn success_carries_operation_telemetry() {
    let (answer, record) = resilient_operation(ComponentType::RagAsk)
        .fallback_value(String::new())
        .run(answer_question(false))
        .await;

    assert!(answer.starts_with("Huginn"));
    assert_eq!(record.routing_decision, "semantic_search");
    assert_eq!(record.latency_ms_total, 150);
    assert_eq!(record.confidence_score, 0.87);
    assert_eq!(record.degradation_level, DegradationLevel::None);
    assert!(record.graceful_message.is_none());
}

#[tokio::test]
async fn failure_returns_fallback_value_and_message() {
    let (answer, record) = resilient_operation(ComponentType::RagAsk)
        .fallback_value("No answer available.".to_string())
        .fallback_message("I encountered an issue searching the documents.")
        .run(answer_question(true))
        .await;

    assert_eq!(answer, "No answer available.");
    assert!(record.fallback_triggered);
    assert_eq!(record.degradation_level, DegradationLevel::Failed);
    assert_eq!(record.fallback_reason.as_deref(), Some("error_ConnectionError"));
    assert_eq!(record.error_class.as_deref(), Some("ConnectionError"));
    let message = record.graceful_message.unwrap();
    assert_eq!(message, "I encountered an issue searching the documents.");
    assert!(!message.contains("refused"));
}

#[tokio::test]
async fn default_fallback_message_is_used() {
    let (_, record) = resilient_operation(ComponentType::Aggregate)
        .fallback_value(Vec::<String>::new())
        .run(async { Err::<(Vec<String>, TelemetryMap), _>(HuginnError::Validation("x".into())) })
        .await;
    assert_eq!(
        record.graceful_message.as_deref(),
        Some("Operation completed with limitations.")
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_degrades_with_partial_value() {
    let (value, record) = with_timeout_fallback(
        Duration::from_secs(2),
        json!({"themes": []}),
        ComponentType::Aggregate,
    )
    .run(async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, HuginnError>((json!({"themes": ["a"]}), TelemetryMap::new()))
    })
    .await;

    assert_eq!(value, json!({"themes": []}));
    assert_eq!(record.degradation_level, DegradationLevel::Degraded);
    assert_eq!(record.error_class.as_deref(), Some("TIMEOUT_EXCEEDED"));
    assert_eq!(record.fallback_reason.as_deref(), Some("timeout"));
    assert_eq!(
        record.graceful_message.as_deref(),
        Some("Operation timed out after 2 seconds.")
    );
}

#[tokio::test(start_paused = true)]
async fn fast_operation_beats_timeout() {
    let (value, record) =
        with_timeout_fallback(Duration::from_secs(2), 0u32, ComponentType::CsvInsights)
            .run(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, HuginnError>((7u32, TelemetryMap::new()))
            })
            .await;
    assert_eq!(value, 7);
    assert!(!record.is_degraded());
}

#[tokio::test]
async fn timeout_wrapper_error_message() {
    let (value, record) =
        with_timeout_fallback(Duration::from_secs(5), None::<String>, ComponentType::Summarize)
            .run(async {
                Err::<(Option<String>, TelemetryMap), _>(HuginnError::ProviderUnavailable(
                    "llm offline".into(),
                ))
            })
            .await;
    assert!(value.is_none());
    assert_eq!(
        record.graceful_message.as_deref(),
        Some("An unexpected error occurred.")
    );
    assert_eq!(record.error_class.as_deref(), Some("LLM_PROVIDER_UNAVAILABLE"));
}
