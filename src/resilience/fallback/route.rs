//! Handlers that switch the routing decision to a cheaper path.

use tracing::{info, warn};

use super::FallbackHandler;
use crate::trace::OperationTrace;
use crate::types::{ComponentType, DegradationLevel, TelemetryRecord};

/// Fixed labels for one primary/fallback route pair.
struct Route {
    primary: &'static str,
    fallback: &'static str,
    level: DegradationLevel,
    message: &'static str,
    default_reason: &'static str,
}

const EMBEDDING_ROUTE: Route = Route {
    primary: "semantic_search",
    fallback: "extractive_fallback",
    level: DegradationLevel::Fallback,
    message: "Results generated without semantic analysis.",
    default_reason: "embedding_unavailable",
};

const VECTORDB_ROUTE: Route = Route {
    primary: "vector_search",
    fallback: "keyword_fallback",
    level: DegradationLevel::Degraded,
    message: "Search completed with reduced accuracy.",
    default_reason: "vectordb_unavailable",
};

#[derive(Debug)]
struct RouteSwitch {
    trace: OperationTrace,
    fallback_used: bool,
}

impl RouteSwitch {
    fn new(component: ComponentType) -> Self {
        Self {
            trace: OperationTrace::for_component(component),
            fallback_used: false,
        }
    }

    fn trigger(&mut self, route: &Route, reason: &str) {
        self.fallback_used = true;
        self.trace.trigger_fallback(reason);
        self.trace.set_routing(route.fallback);
        // Level applies immediately; the message waits for `finish`.
        self.trace.raise_degradation(route.level);
    }

    fn finish(mut self, route: &Route) -> TelemetryRecord {
        if self.fallback_used {
            let reason = self
                .trace
                .snapshot()
                .fallback_reason
                .clone()
                .unwrap_or_else(|| route.default_reason.to_string());
            self.trace
                .set_degradation(route.level, route.message, Some(&reason));
        }
        self.trace.finish()
    }
}

/// Embedding service unavailable: serve extractive results.
///
/// Degrades to `fallback` with routing `extractive_fallback`; a successful
/// primary path is routed as `semantic_search`.
#[derive(Debug)]
pub struct EmbeddingFallbackHandler {
    component: ComponentType,
    inner: RouteSwitch,
}

impl EmbeddingFallbackHandler {
    pub fn new(component: ComponentType) -> Self {
        Self {
            component,
            inner: RouteSwitch::new(component),
        }
    }
}

impl FallbackHandler for EmbeddingFallbackHandler {
    type Output<D> = D;
    const DEFAULT_REASON: &'static str = EMBEDDING_ROUTE.default_reason;

    fn trace(&self) -> &OperationTrace {
        &self.inner.trace
    }

    fn trace_mut(&mut self) -> &mut OperationTrace {
        &mut self.inner.trace
    }

    fn trigger_fallback(&mut self, reason: &str) {
        self.inner.trigger(&EMBEDDING_ROUTE, reason);
        info!(component = %self.component, reason, "embedding fallback triggered");
    }

    fn set_success(&mut self) {
        self.inner.trace.set_routing(EMBEDDING_ROUTE.primary);
    }

    fn is_degraded(&self) -> bool {
        self.inner.fallback_used
    }

    fn get_result<D>(self, data: D) -> (Self::Output<D>, TelemetryRecord) {
        (data, self.inner.finish(&EMBEDDING_ROUTE))
    }
}

/// Vector store unavailable: serve keyword search results.
///
/// Degrades to `degraded` (search quality lost, not just a mode change) with
/// routing `keyword_fallback`; a successful primary path is routed as
/// `vector_search`.
#[derive(Debug)]
pub struct VectorDBFallbackHandler {
    component: ComponentType,
    inner: RouteSwitch,
}

impl VectorDBFallbackHandler {
    pub fn new(component: ComponentType) -> Self {
        Self {
            component,
            inner: RouteSwitch::new(component),
        }
    }
}

impl FallbackHandler for VectorDBFallbackHandler {
    type Output<D> = D;
    const DEFAULT_REASON: &'static str = VECTORDB_ROUTE.default_reason;

    fn trace(&self) -> &OperationTrace {
        &self.inner.trace
    }

    fn trace_mut(&mut self) -> &mut OperationTrace {
        &mut self.inner.trace
    }

    fn trigger_fallback(&mut self, reason: &str) {
        self.inner.trigger(&VECTORDB_ROUTE, reason);
        warn!(component = %self.component, reason, "vector store fallback triggered");
    }

    fn set_success(&mut self) {
        self.inner.trace.set_routing(VECTORDB_ROUTE.primary);
    }

    fn is_degraded(&self) -> bool {
        self.inner.fallback_used
    }

    fn get_result<D>(self, data: D) -> (Self::Output<D>, TelemetryRecord) {
        (data, self.inner.finish(&VECTORDB_ROUTE))
    }
}
