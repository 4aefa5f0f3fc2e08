//! Degraded results for low-confidence or undersized inputs.

use tracing::info;

use super::FallbackHandler;
use crate::trace::OperationTrace;
use crate::types::{ComponentType, DegradationLevel, ErrorClass, TelemetryRecord};
use crate::{HuginnError, Result};

const LOW_CONFIDENCE: &str = "low_confidence";
const INSUFFICIENT_DATA: &str = "insufficient_data";

/// Degrades a result to `degraded` when its confidence or supporting data
/// volume falls below configured thresholds.
///
/// ```rust
/// # use huginn::{ComponentType, FallbackHandler, WeakSignalHandler};
/// let mut handler = WeakSignalHandler::new(ComponentType::CsvInsights, 0.3, Some(10))?;
/// handler.check_confidence(0.8);
/// handler.check_data_size(4);
/// assert!(handler.should_degrade());
/// let (_, record) = handler.get_result("simplified analysis");
/// assert_eq!(
///     record.graceful_message.as_deref(),
///     Some("Results are limited due to insufficient data.")
/// );
/// # Ok::<(), huginn::HuginnError>(())
/// ```
#[derive(Debug)]
pub struct WeakSignalHandler {
    component: ComponentType,
    trace: OperationTrace,
    confidence_threshold: f64,
    min_data_points: Option<usize>,
    degradation_reason: Option<String>,
}

impl WeakSignalHandler {
    /// `confidence_threshold` must lie in `[0, 1]`.
    pub fn new(
        component: ComponentType,
        confidence_threshold: f64,
        min_data_points: Option<usize>,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(HuginnError::Configuration(format!(
                "confidence threshold must be within [0, 1], got {confidence_threshold}"
            )));
        }
        Ok(Self {
            component,
            trace: OperationTrace::for_component(component),
            confidence_threshold,
            min_data_points,
            degradation_reason: None,
        })
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Record `confidence` on the trace; below the threshold the result will
    /// degrade.
    pub fn check_confidence(&mut self, confidence: f64) {
        self.trace.set_confidence(confidence);
        if confidence < self.confidence_threshold {
            info!(
                component = %self.component,
                confidence,
                threshold = self.confidence_threshold,
                "weak signal detected"
            );
            self.degradation_reason = Some(LOW_CONFIDENCE.to_string());
        }
    }

    /// Below `min_data_points` the result will degrade. Without a minimum this
    /// check always passes.
    pub fn check_data_size(&mut self, size: usize) {
        if let Some(required) = self.min_data_points
            && size < required
        {
            info!(
                component = %self.component,
                size,
                required,
                "insufficient data"
            );
            self.degradation_reason = Some(INSUFFICIENT_DATA.to_string());
        }
    }

    pub fn should_degrade(&self) -> bool {
        self.degradation_reason.is_some()
    }

    /// The most recent failing check's reason.
    pub fn degradation_reason(&self) -> Option<&str> {
        self.degradation_reason.as_deref()
    }
}

impl FallbackHandler for WeakSignalHandler {
    type Output<D> = D;
    const DEFAULT_REASON: &'static str = "weak_signal";

    fn trace(&self) -> &OperationTrace {
        &self.trace
    }

    fn trace_mut(&mut self) -> &mut OperationTrace {
        &mut self.trace
    }

    fn trigger_fallback(&mut self, reason: &str) {
        self.degradation_reason = Some(reason.to_string());
    }

    /// Weak-signal state is driven by the checks alone.
    fn set_success(&mut self) {}

    fn is_degraded(&self) -> bool {
        self.should_degrade()
    }

    fn get_result<D>(mut self, data: D) -> (Self::Output<D>, TelemetryRecord) {
        if let Some(reason) = self.degradation_reason.take() {
            let message = match reason.as_str() {
                LOW_CONFIDENCE => "Results have low confidence due to weak signals in the data.",
                INSUFFICIENT_DATA => "Results are limited due to insufficient data.",
                _ => "Results may be unreliable.",
            };
            self.trace.trigger_fallback(&reason);
            self.trace
                .set_degradation(DegradationLevel::Degraded, message, Some(&reason));
            self.trace.set_error_class(ErrorClass::RetrievalWeakSignal);
        }
        (data, self.trace.finish())
    }
}
