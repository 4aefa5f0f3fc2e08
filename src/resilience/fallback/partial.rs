//! Best-effort results for batches where some items failed.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::FallbackHandler;
use crate::trace::OperationTrace;
use crate::types::{Classify, ComponentType, DegradationLevel, TelemetryRecord};

/// One failed item and why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub reason: String,
}

/// Batch result: the data that was produced plus success accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialOutcome<D> {
    pub data: D,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_items: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_items: Vec<ItemFailure>,
}

/// Tracks per-item outcomes of a batch and classifies the whole.
///
/// | failures | successes | level |
/// |---|---|---|
/// | 0 | any | `none` |
/// | > 0 | 0 | `failed` |
/// | fewer than successes | | `mild` |
/// | at least successes | > 0 | `degraded` |
#[derive(Debug)]
pub struct PartialFailureHandler {
    component: ComponentType,
    trace: OperationTrace,
    total_items: usize,
    success_count: usize,
    failures: Vec<ItemFailure>,
}

impl PartialFailureHandler {
    pub fn new(component: ComponentType, total_items: usize) -> Self {
        Self {
            component,
            trace: OperationTrace::for_component(component),
            total_items,
            success_count: 0,
            failures: Vec::new(),
        }
    }

    pub fn mark_success(&mut self) {
        self.success_count += 1;
    }

    pub fn mark_failure(&mut self, item_id: impl Into<String>, reason: impl Into<String>) {
        let failure = ItemFailure {
            item_id: item_id.into(),
            reason: reason.into(),
        };
        warn!(
            component = %self.component,
            item = %failure.item_id,
            reason = %failure.reason,
            "item failed"
        );
        self.failures.push(failure);
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    /// Level, message and reason for the current counts.
    pub fn classify(&self) -> (DegradationLevel, Option<String>, Option<&'static str>) {
        let successes = self.success_count;
        let failures = self.failure_count();
        let total = self.total_items;

        if failures == 0 {
            (DegradationLevel::None, None, None)
        } else if successes == 0 {
            (
                DegradationLevel::Failed,
                Some("None of the items could be processed successfully.".to_string()),
                Some("all_items_failed"),
            )
        } else if failures < successes {
            (
                DegradationLevel::Mild,
                Some(format!("{failures} of {total} items could not be processed.")),
                Some("partial_failure_mild"),
            )
        } else {
            (
                DegradationLevel::Degraded,
                Some(format!(
                    "Only {successes} of {total} items were successfully processed."
                )),
                Some("partial_failure_major"),
            )
        }
    }
}

impl FallbackHandler for PartialFailureHandler {
    type Output<D> = PartialOutcome<D>;
    const DEFAULT_REASON: &'static str = "partial_failure";

    fn trace(&self) -> &OperationTrace {
        &self.trace
    }

    fn trace_mut(&mut self) -> &mut OperationTrace {
        &mut self.trace
    }

    /// Mark the batch as served by a fallback path, independent of item counts.
    fn trigger_fallback(&mut self, reason: &str) {
        self.trace.trigger_fallback(reason);
        self.trace.raise_degradation(DegradationLevel::Fallback);
    }

    fn set_success(&mut self) {
        self.mark_success();
    }

    /// Per-item outcome: a failure is counted as a failed item, named by its
    /// position in the batch, instead of switching the batch to a fallback.
    fn attempt<T, E>(&mut self, outcome: Result<T, E>) -> Option<T>
    where
        E: Classify + fmt::Display,
    {
        match outcome {
            Ok(value) => {
                self.mark_success();
                Some(value)
            }
            Err(e) => {
                let position = self.success_count + self.failures.len();
                self.mark_failure(format!("item_{position}"), e.class_tag());
                None
            }
        }
    }

    fn is_degraded(&self) -> bool {
        !self.failures.is_empty() || self.trace.snapshot().is_degraded()
    }

    fn get_result<D>(mut self, data: D) -> (Self::Output<D>, TelemetryRecord) {
        let (level, message, reason) = self.classify();
        if let (Some(message), Some(reason)) = (message, reason) {
            self.trace.trigger_fallback(reason);
            self.trace.set_degradation(level, &message, Some(reason));
        }
        self.trace.attach_metadata([
            ("success_count", self.success_count),
            ("failure_count", self.failures.len()),
            ("total_items", self.total_items),
        ]);

        let outcome = PartialOutcome {
            data,
            success_count: self.success_count,
            failure_count: self.failures.len(),
            total_items: self.total_items,
            failed_items: self.failures,
        };
        (outcome, self.trace.finish())
    }
}
