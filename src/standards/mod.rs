//! Telemetry standards: completion and merging of telemetry records.
//!
//! Every subsystem calls [`ensure_complete_telemetry`] before handing
//! telemetry to a downstream consumer, and [`merge_telemetry`] when a response
//! is composed from several internal calls.

mod complete;
mod merge;

pub use complete::{
    LEGACY_ALIASES, compute_total_latency, ensure_complete, ensure_complete_telemetry,
    ensure_complete_value, extract_standard_telemetry,
};
pub(crate) use complete::{as_u64, remap_legacy};
pub use merge::{merge_records, merge_telemetry};
