//! User-facing messages for degraded and failed operations.
//!
//! Messages are short, never expose technical detail and never blame the
//! user; each comes with a hint suggesting what to do next. Technical causes
//! travel separately in `fallback_reason` or the log.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::types::{DegradationLevel, TelemetryRecord};

/// Extension key under which [`GracefulNotice::apply`] stores the action hint.
pub const USER_ACTION_HINT: &str = "user_action_hint";

/// Extension key for the coarse failure category set by [`graceful_failure`].
pub const ERROR_TYPE: &str = "error_type";

/// The situation a message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContext {
    RagNoResults,
    RagLowConfidence,
    RagNoDocuments,
    RagRetrievalError,
    SummarizeTooShort,
    SummarizeNoContent,
    SummarizeLowQuality,
    SummarizeExtractiveFallback,
    InsightsTooFewDocs,
    InsightsNoClustering,
    InsightsPartialFailure,
    InsightsAllFailed,
    CsvInsufficientData,
    CsvNoVariance,
    CsvFormatError,
    GenericFallback,
    GenericError,
}

impl MessageContext {
    pub const ALL: [MessageContext; 17] = [
        Self::RagNoResults,
        Self::RagLowConfidence,
        Self::RagNoDocuments,
        Self::RagRetrievalError,
        Self::SummarizeTooShort,
        Self::SummarizeNoContent,
        Self::SummarizeLowQuality,
        Self::SummarizeExtractiveFallback,
        Self::InsightsTooFewDocs,
        Self::InsightsNoClustering,
        Self::InsightsPartialFailure,
        Self::InsightsAllFailed,
        Self::CsvInsufficientData,
        Self::CsvNoVariance,
        Self::CsvFormatError,
        Self::GenericFallback,
        Self::GenericError,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::RagNoResults => "rag_no_results",
            Self::RagLowConfidence => "rag_low_confidence",
            Self::RagNoDocuments => "rag_no_documents",
            Self::RagRetrievalError => "rag_retrieval_error",
            Self::SummarizeTooShort => "summarize_too_short",
            Self::SummarizeNoContent => "summarize_no_content",
            Self::SummarizeLowQuality => "summarize_low_quality",
            Self::SummarizeExtractiveFallback => "summarize_extractive_fallback",
            Self::InsightsTooFewDocs => "insights_too_few_docs",
            Self::InsightsNoClustering => "insights_no_clustering",
            Self::InsightsPartialFailure => "insights_partial_failure",
            Self::InsightsAllFailed => "insights_all_failed",
            Self::CsvInsufficientData => "csv_insufficient_data",
            Self::CsvNoVariance => "csv_no_variance",
            Self::CsvFormatError => "csv_format_error",
            Self::GenericFallback => "generic_fallback",
            Self::GenericError => "generic_error",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::RagNoResults => "I couldn't find information about this in the documents.",
            Self::RagLowConfidence => "I couldn't find a confident answer in the documents.",
            Self::RagNoDocuments => "No documents are available to search.",
            Self::RagRetrievalError => "I encountered an issue searching the documents.",
            Self::SummarizeTooShort => "The document is too small to summarize meaningfully.",
            Self::SummarizeNoContent => {
                "The document doesn't contain enough content to summarize."
            }
            Self::SummarizeLowQuality => {
                "The summary has low confidence due to limited content quality."
            }
            Self::SummarizeExtractiveFallback => "Generated a basic summary using key sentences.",
            Self::InsightsTooFewDocs => {
                "At least 2 documents are needed for cross-document insights."
            }
            Self::InsightsNoClustering => {
                "Insights were generated without semantic grouping due to low signal."
            }
            Self::InsightsPartialFailure => {
                "Some documents couldn't be processed, but insights were generated from available documents."
            }
            Self::InsightsAllFailed => "None of the documents could be processed successfully.",
            Self::CsvInsufficientData => {
                "This dataset doesn't contain enough structured information for analysis."
            }
            Self::CsvNoVariance => "This dataset lacks enough variation for meaningful insights.",
            Self::CsvFormatError => "The data format isn't suitable for analysis.",
            Self::GenericFallback => "The operation completed with limitations.",
            Self::GenericError => "An unexpected issue occurred during processing.",
        }
    }

    pub fn action_hint(self) -> &'static str {
        match self {
            Self::RagNoResults => "Try rephrasing your question or using different keywords.",
            Self::RagLowConfidence => {
                "Try rephrasing the question or upload a document with more details."
            }
            Self::RagNoDocuments => "Upload documents first to enable search.",
            Self::RagRetrievalError | Self::GenericError => {
                "Please try again or contact support if the issue persists."
            }
            Self::SummarizeTooShort => "Upload a longer document for better summarization.",
            Self::SummarizeNoContent => "Ensure the document contains meaningful text content.",
            Self::SummarizeLowQuality => {
                "Upload documents with richer content for better summaries."
            }
            Self::SummarizeExtractiveFallback => {
                "The summary focuses on key sentences from the document."
            }
            Self::InsightsTooFewDocs => {
                "Upload at least 2 documents to enable cross-document analysis."
            }
            Self::InsightsNoClustering => {
                "This doesn't affect the core insights. Themes and overlaps are still available."
            }
            Self::InsightsPartialFailure => {
                "Review the insights from successfully processed documents."
            }
            Self::InsightsAllFailed => "Check document IDs and try again with valid documents.",
            Self::CsvInsufficientData => "Try uploading a dataset with more rows or columns.",
            Self::CsvNoVariance => "Ensure the data contains varied values for analysis.",
            Self::CsvFormatError => "Check that the file is properly formatted as CSV.",
            Self::GenericFallback => "Results may be limited. Consider refining your input.",
        }
    }

    /// Coarse failure category: the key without `_error`, underscores as spaces.
    ///
    /// `rag_retrieval_error` → `"rag retrieval"`.
    pub fn error_type(self) -> String {
        self.key().replace("_error", "").replace('_', " ")
    }

    /// Parse a context key, falling back to `fallback` for unknown keys.
    pub fn parse_or(key: &str, fallback: MessageContext) -> MessageContext {
        key.parse().unwrap_or(fallback)
    }
}

impl fmt::Display for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when parsing an unknown message context key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message context: {0}")]
pub struct UnknownMessageContext(pub String);

impl FromStr for MessageContext {
    type Err = UnknownMessageContext;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ctx| ctx.key() == s)
            .ok_or_else(|| UnknownMessageContext(s.to_string()))
    }
}

/// Message, hint and level to fold into a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GracefulNotice {
    pub degradation_level: DegradationLevel,
    pub graceful_message: Option<String>,
    pub user_action_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl GracefulNotice {
    /// Fold this notice into a record.
    ///
    /// Degradation is raised, never lowered. The hint and error type are
    /// stored as extension fields.
    pub fn apply(&self, record: &mut TelemetryRecord) {
        record.raise_degradation(self.degradation_level);
        if let Some(message) = &self.graceful_message {
            record.graceful_message = Some(message.clone());
        }
        if let Some(reason) = &self.fallback_reason {
            record.fallback_reason = Some(reason.clone());
        }
        if let Some(hint) = &self.user_action_hint {
            record
                .extensions
                .insert(USER_ACTION_HINT.into(), Value::from(hint.as_str()));
        }
        if let Some(error_type) = &self.error_type {
            record
                .extensions
                .insert(ERROR_TYPE.into(), Value::from(error_type.as_str()));
        }
    }
}

/// Full-quality outcome: level `none`, no message, no hint.
pub fn success_message() -> GracefulNotice {
    GracefulNotice {
        degradation_level: DegradationLevel::None,
        graceful_message: None,
        user_action_hint: None,
        fallback_reason: None,
        error_type: None,
    }
}

/// Fallback outcome for `context`. `reason` is technical and goes to
/// `fallback_reason`; `suggestion` replaces the context's default hint.
pub fn graceful_fallback(
    context: MessageContext,
    reason: &str,
    suggestion: Option<&str>,
) -> GracefulNotice {
    info!(context = %context, reason, "graceful fallback");
    GracefulNotice {
        degradation_level: DegradationLevel::Fallback,
        graceful_message: Some(context.message().to_string()),
        user_action_hint: Some(suggestion.unwrap_or(context.action_hint()).to_string()),
        fallback_reason: Some(reason.to_string()),
        error_type: None,
    }
}

/// Failure outcome for `context`. `error` is logged and nowhere else.
pub fn graceful_failure(context: MessageContext, error: &str) -> GracefulNotice {
    error!(context = %context, error, "graceful failure");
    GracefulNotice {
        degradation_level: DegradationLevel::Failed,
        graceful_message: Some(context.message().to_string()),
        user_action_hint: Some(context.action_hint().to_string()),
        fallback_reason: None,
        error_type: Some(context.error_type()),
    }
}

/// Generic message for a degraded record that carries none of its own.
pub(crate) fn default_message(level: DegradationLevel) -> &'static str {
    match level {
        DegradationLevel::Failed => MessageContext::GenericError.message(),
        _ => MessageContext::GenericFallback.message(),
    }
}
