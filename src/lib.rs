//! Huginn - observability and resilience core for document-intelligence services
//!
//! Every operation reports one [`TelemetryRecord`]: latencies, routing,
//! confidence, cache and retry accounting, and a severity-ordered
//! [`DegradationLevel`] with a user-facing graceful message. This crate
//! provides the record, the rules for completing and merging records, a
//! per-call [`OperationTrace`], and retry/fallback wrappers that turn
//! business failures into degraded values instead of errors.
//!
//! # Tracing an operation
//!
//! ```rust
//! use huginn::{DegradationLevel, EmbeddingFallbackHandler, FallbackHandler, ComponentType};
//!
//! let mut handler = EmbeddingFallbackHandler::new(ComponentType::RagSearch);
//! handler.trace_mut().record_step("retrieval", 40);
//! // the embedding service is down: serve extractive results instead
//! handler.trigger_default_fallback();
//! let (chunks, record) = handler.get_result(vec!["first sentence", "second sentence"]);
//!
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(record.routing_decision, "extractive_fallback");
//! assert_eq!(record.degradation_level, DegradationLevel::Fallback);
//! ```
//!
//! # Retrying
//!
//! ```rust,no_run
//! use huginn::{Huginn, HuginnError};
//!
//! # async fn vector_search(q: &str) -> Result<Vec<String>, HuginnError> { Ok(vec![]) }
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let huginn = Huginn::builder().build()?;
//!     let mut trace = huginn.trace("rag_search");
//!     let hits = huginn
//!         .retry("vector_search")
//!         .run_traced(&mut trace, || vector_search("what is huginn?"))
//!         .await;
//!     let record = trace.finish();
//!     println!("{} hits, {:?}", hits.len(), record.degradation_level);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
mod context;
pub mod error;
pub mod graceful;
pub mod resilience;
pub mod standards;
pub mod telemetry;
pub mod trace;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheContext, CacheStats, TtlCache, cache_key};
pub use config::Config;
pub use context::{Huginn, HuginnBuilder};
pub use error::{HuginnError, Result};
pub use graceful::{
    GracefulNotice, MessageContext, graceful_failure, graceful_fallback, success_message,
};
pub use resilience::{
    AnswerPayload, DegradedDefault, EmbeddingFallbackHandler, FallbackHandler, ItemFailure,
    OperationCategory, PartialFailureHandler, PartialOutcome, PredictionPayload,
    ResilientOperation, RetryExecutor, RetryMeta, RetryPolicy, Retrying, Timed,
    VectorDBFallbackHandler, WeakSignalHandler, join_traced, measure_latency,
    measure_latency_blocking, resilient_operation, retry_with_backoff, with_timeout_fallback,
};
pub use standards::{
    compute_total_latency, ensure_complete, ensure_complete_telemetry, ensure_complete_value,
    extract_standard_telemetry, merge_records, merge_telemetry,
};
pub use trace::{Envelope, OperationTrace, StepTiming, finalize_response};
pub use types::{
    Classify, ComponentType, DegradationLevel, ErrorClass, TelemetryMap, TelemetryRecord,
};
pub use version::{PKG_VERSION, version_string};
