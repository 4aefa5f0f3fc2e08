use huginn::{
    ComponentType, DegradationLevel, EmbeddingFallbackHandler, FallbackHandler, HuginnError,
    PartialFailureHandler, VectorDBFallbackHandler, WeakSignalHandler,
};

// ============================================================================
// Mocks
// ============================================================================

fn embed_unavailable(_text: &str) -> Result<Vec<f32>, HuginnError> {
    Err(HuginnError::ProviderUnavailable("embedding service down".into()))
}

fn embed_ok(text: &str) -> Result<Vec<f32>, HuginnError> {
    Ok(vec![text.len() as f32, 0.5])
}

fn partial_handler(successes: usize, failures: usize) -> PartialFailureHandler {
    let mut handler = PartialFailureHandler::new(ComponentType::Aggregate, 10);
    for _ in 0..successes {
        handler.mark_success();
    }
    for i in 0..failures {
        handler.mark_failure(format!("doc-{i}"), "extraction failed");
    }
    handler
}

// ============================================================================
// Route switching handlers
// ============================================================================

#[test]
fn embedding_failure_serves_extractive_results() {
    let mut handler = EmbeddingFallbackHandler::new(ComponentType::Summarize);
    let embedding = handler.attempt(embed_unavailable("chunk"));
    assert!(embedding.is_none());
    assert!(handler.is_degraded());

    let sentences = vec!["First key sentence.", "Second key sentence."];
    let (data, record) = handler.get_result(sentences.clone());

    assert_eq!(data, sentences);
    assert_eq!(record.degradation_level, DegradationLevel::Fallback);
    assert_eq!(record.routing_decision, "extractive_fallback");
    assert!(record.fallback_triggered);
    assert_eq!(record.fallback_reason.as_deref(), Some("embedding_unavailable"));
    assert!(record.graceful_message.is_some());
}

#[test]
fn embedding_success_stays_on_semantic_path() {
    let mut handler = EmbeddingFallbackHandler::new(ComponentType::RagSearch);
    let embedding = handler.attempt(embed_ok("chunk"));
    assert_eq!(embedding, Some(vec![5.0, 0.5]));

    let (_, record) = handler.get_result(());
    assert_eq!(record.routing_decision, "semantic_search");
    assert_eq!(record.degradation_level, DegradationLevel::None);
    assert!(!record.fallback_triggered);
}

#[test]
fn vector_store_failure_degrades_to_keyword_search() {
    let mut handler = VectorDBFallbackHandler::new(ComponentType::RagAsk);
    handler.trace_mut().record_step("retrieval", 35);
    handler.trigger_fallback("connection refused by vector store");

    let (hits, record) = handler.get_result(vec!["keyword hit"]);
    assert_eq!(hits.len(), 1);
    assert_eq!(record.routing_decision, "keyword_fallback");
    assert_eq!(record.degradation_level, DegradationLevel::Degraded);
    assert_eq!(record.latency_ms_retrieval, 35);
    assert_eq!(
        record.graceful_message.as_deref(),
        Some("Search completed with reduced accuracy.")
    );
}

#[test]
fn route_fallback_does_not_lower_existing_degradation() {
    let mut handler = EmbeddingFallbackHandler::new(ComponentType::RagAsk);
    handler.trace_mut().raise_degradation(DegradationLevel::Failed);
    handler.trigger_default_fallback();
    let (_, record) = handler.get_result(());
    assert_eq!(record.degradation_level, DegradationLevel::Failed);
}

// ============================================================================
// Weak signal
// ============================================================================

#[test]
fn low_confidence_degrades_result() {
    let mut handler = WeakSignalHandler::new(ComponentType::RagAsk, 0.3, None).unwrap();
    handler.check_confidence(0.1);
    let (answer, record) = handler.get_result("best effort answer");

    assert_eq!(answer, "best effort answer");
    assert_eq!(record.degradation_level, DegradationLevel::Degraded);
    assert!(
        record
            .graceful_message
            .as_deref()
            .unwrap()
            .contains("low confidence")
    );
    assert_eq!(record.confidence_score, 0.1);
    assert_eq!(record.error_class.as_deref(), Some("RETRIEVAL_WEAK_SIGNAL"));
}

#[test]
fn confidence_at_threshold_is_not_weak() {
    let mut handler = WeakSignalHandler::new(ComponentType::RagAsk, 0.3, None).unwrap();
    handler.check_confidence(0.3);
    assert!(!handler.should_degrade());
}

#[test]
fn manual_trigger_uses_generic_message() {
    let mut handler = WeakSignalHandler::new(ComponentType::CsvInsights, 0.5, None).unwrap();
    handler.trigger_default_fallback();
    let (_, record) = handler.get_result(());
    assert_eq!(record.fallback_reason.as_deref(), Some("weak_signal"));
    assert_eq!(
        record.graceful_message.as_deref(),
        Some("Results may be unreliable.")
    );
}

#[test]
fn invalid_threshold_is_configuration_error() {
    let err = WeakSignalHandler::new(ComponentType::RagAsk, 2.0, None).unwrap_err();
    assert!(matches!(err, HuginnError::Configuration(_)));
}

// ============================================================================
// Partial failure
// ============================================================================

#[test]
fn partial_failure_classification_table() {
    let cases = [
        (10, 0, DegradationLevel::None),
        (0, 10, DegradationLevel::Failed),
        (7, 3, DegradationLevel::Mild),
        (3, 7, DegradationLevel::Degraded),
    ];
    for (successes, failures, expected) in cases {
        let (outcome, record) = partial_handler(successes, failures).get_result(());
        assert_eq!(
            record.degradation_level, expected,
            "{successes} ok / {failures} failed"
        );
        assert_eq!(outcome.success_count, successes);
        assert_eq!(outcome.failure_count, failures);
        assert_eq!(outcome.total_items, 10);
        assert_eq!(outcome.failed_items.len(), failures);
    }
}

#[test]
fn partial_failure_messages() {
    let (_, record) = partial_handler(7, 3).get_result(());
    assert_eq!(
        record.graceful_message.as_deref(),
        Some("3 of 10 items could not be processed.")
    );
    assert_eq!(record.extensions["success_count"], 7);

    let (_, record) = partial_handler(0, 10).get_result(());
    assert_eq!(record.fallback_reason.as_deref(), Some("all_items_failed"));
    assert!(record.fallback_triggered);
}

#[test]
fn partial_outcome_serializes_flat() {
    let (outcome, _) = partial_handler(9, 1).get_result(vec!["theme a"]);
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["data"][0], "theme a");
    assert_eq!(value["failed_items"][0]["item_id"], "doc-0");
    assert_eq!(value["failed_items"][0]["reason"], "extraction failed");
}

#[test]
fn attempting_items_keeps_counts_in_step() {
    let texts = ["alpha", "beta", "gamma"];
    let mut handler = PartialFailureHandler::new(ComponentType::Summarize, texts.len());
    let mut embeddings = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        let outcome = if i == 0 { embed_ok(text) } else { embed_unavailable(text) };
        embeddings.extend(handler.attempt(outcome));
    }

    let (outcome, record) = handler.get_result(embeddings);
    assert_eq!(outcome.data.len(), 1);
    assert_eq!(outcome.success_count, 1);
    assert_eq!(outcome.failure_count, 2);
    assert_eq!(outcome.failed_items[1].item_id, "item_2");
    assert_eq!(outcome.failed_items[1].reason, "LLM_PROVIDER_UNAVAILABLE");
    assert_eq!(record.degradation_level, DegradationLevel::Degraded);
    assert_eq!(
        record.graceful_message.as_deref(),
        Some("Only 1 of 3 items were successfully processed.")
    );
}
