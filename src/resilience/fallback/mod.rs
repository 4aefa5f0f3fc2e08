//! Scoped fallback strategies.
//!
//! Each handler is created per operation, owns its [`OperationTrace`] and is
//! consumed by [`FallbackHandler::get_result`], which standardizes the
//! degradation and telemetry of the unit of work it wrapped:
//!
//! - [`EmbeddingFallbackHandler`]: semantic path unavailable, extractive
//!   results served instead (`fallback`).
//! - [`VectorDBFallbackHandler`]: vector search unavailable, keyword search
//!   served instead (`degraded`).
//! - [`PartialFailureHandler`]: some items of a batch failed.
//! - [`WeakSignalHandler`]: confidence or data volume below threshold.

mod partial;
mod route;
mod weak_signal;

pub use partial::{ItemFailure, PartialFailureHandler, PartialOutcome};
pub use route::{EmbeddingFallbackHandler, VectorDBFallbackHandler};
pub use weak_signal::WeakSignalHandler;

use std::fmt;

use tracing::warn;

use crate::trace::OperationTrace;
use crate::types::{Classify, TelemetryRecord};

/// Shared surface of the fallback handlers.
pub trait FallbackHandler: Sized {
    /// What [`get_result`](Self::get_result) hands back for input data `D`.
    type Output<D>;

    /// Reason recorded by [`trigger_default_fallback`](Self::trigger_default_fallback).
    const DEFAULT_REASON: &'static str;

    /// The handler's trace, for recording steps and metadata.
    fn trace(&self) -> &OperationTrace;

    fn trace_mut(&mut self) -> &mut OperationTrace;

    /// Switch to the fallback path, recording the technical `reason`.
    fn trigger_fallback(&mut self, reason: &str);

    /// Record that the primary path succeeded.
    fn set_success(&mut self);

    /// Whether [`get_result`](Self::get_result) will report degradation.
    fn is_degraded(&self) -> bool;

    /// Finalize the handler's trace and wrap `data`.
    fn get_result<D>(self, data: D) -> (Self::Output<D>, TelemetryRecord);

    fn trigger_default_fallback(&mut self) {
        self.trigger_fallback(Self::DEFAULT_REASON);
    }

    /// Route a primary-path outcome: success marks the handler successful,
    /// failure triggers the default fallback and yields `None`.
    fn attempt<T, E>(&mut self, outcome: Result<T, E>) -> Option<T>
    where
        E: Classify + fmt::Display,
    {
        match outcome {
            Ok(value) => {
                self.set_success();
                Some(value)
            }
            Err(e) => {
                warn!(
                    operation = self.trace().name(),
                    error_class = %e.class_tag(),
                    error = %e,
                    "primary path failed"
                );
                self.trigger_default_fallback();
                None
            }
        }
    }
}
