//! Version information with embedded build metadata.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build timestamp (RFC 3339), or "unknown" if unavailable.
pub const BUILD_TIMESTAMP: &str = match option_env!("VERGEN_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "unknown",
};

/// Full version string: `{version} (built {timestamp})`.
///
/// Example: `0.1.0 (built 2026-10-19T08:12:44.000000000Z)`
pub fn version_string() -> String {
    format!("{PKG_VERSION} (built {BUILD_TIMESTAMP})")
}
