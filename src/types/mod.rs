//! Public data model for the Huginn API.

mod component;
pub mod degradation;
mod error_class;
mod record;

pub use component::ComponentType;
pub use degradation::{DegradationLevel, UnknownDegradationLevel, is_at_least, worse};
pub use error_class::{Classify, ErrorClass, type_tag};
pub use record::{
    CANONICAL_FIELDS, TelemetryMap, TelemetryRecord, UNKNOWN_ROUTING, clamp_confidence,
};
