//! Degradation levels and the "worse wins" policy.
//!
//! Every comparison in the crate uses the single ordering
//! `none < mild < fallback < degraded < failed`. In particular, combining
//! `mild` with `fallback` yields `fallback`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// How far an operation's actual behaviour deviated from its ideal path.
///
/// Variants are declared in severity order, so the derived `Ord` is the
/// degradation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradationLevel {
    /// The operation took its ideal path.
    #[default]
    None,
    /// Minor limitations; the result is still essentially complete.
    Mild,
    /// An alternative strategy served the request.
    Fallback,
    /// The result is usable but of reduced quality.
    Degraded,
    /// The operation could not produce a meaningful result.
    Failed,
}

impl DegradationLevel {
    /// All levels, least severe first.
    pub const ALL: [DegradationLevel; 5] = [
        DegradationLevel::None,
        DegradationLevel::Mild,
        DegradationLevel::Fallback,
        DegradationLevel::Degraded,
        DegradationLevel::Failed,
    ];

    /// The wire token for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Mild => "mild",
            Self::Fallback => "fallback",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }

    /// Numeric severity: higher = more degraded.
    pub fn severity(self) -> u8 {
        self as u8
    }

    /// The more severe of two levels.
    pub fn worse(self, other: DegradationLevel) -> DegradationLevel {
        self.max(other)
    }

    /// Whether this level is at least as severe as `threshold`.
    pub fn is_at_least(self, threshold: DegradationLevel) -> bool {
        self >= threshold
    }

    /// Whether the operation deviated from its ideal path at all.
    pub fn is_degraded(self) -> bool {
        self != Self::None
    }

    /// Parse a wire token, coercing anything unrecognized to `None`.
    ///
    /// Matching is exact: tokens are lowercase on the wire.
    pub fn parse_lenient(token: &str) -> DegradationLevel {
        token.parse().unwrap_or_default()
    }
}

/// The more severe of two levels.
pub fn worse(a: DegradationLevel, b: DegradationLevel) -> DegradationLevel {
    a.worse(b)
}

/// Whether `level` is at least as severe as `threshold`.
pub fn is_at_least(level: DegradationLevel, threshold: DegradationLevel) -> bool {
    level.is_at_least(threshold)
}

impl fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a token is not one of the five degradation levels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown degradation level: {0}")]
pub struct UnknownDegradationLevel(pub String);

impl FromStr for DegradationLevel {
    type Err = UnknownDegradationLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "mild" => Ok(Self::Mild),
            "fallback" => Ok(Self::Fallback),
            "degraded" => Ok(Self::Degraded),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownDegradationLevel(other.to_string())),
        }
    }
}

// Unknown tokens, null and non-string values deserialize to `None` rather
// than failing the whole record.
impl<'de> Deserialize<'de> for DegradationLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Self::parse_lenient).unwrap_or_default())
    }
}
