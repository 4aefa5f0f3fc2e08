//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. Explicit path (e.g. `--config <path>`); missing is an error
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//! 4. Built-in defaults when no file exists
//!
//! Environment variables are applied on top of the file; see
//! [`Config::apply_env`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::{HuginnError, Result};

/// Process configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub signals: SignalSettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive (default: "info"). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds (default: 500).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Backoff multiplier (default: 2.0).
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Wall-clock budget per operation in milliseconds; 0 disables (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Weak-signal thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSettings {
    /// Confidence below which results degrade (default: 0.55).
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Minimum supporting data points; unset disables the check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_data_points: Option<usize>,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            min_data_points: None,
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.55
}

/// In-memory caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Whether caches are allocated at all (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// TTL for caches without their own, in seconds; 0 disables expiry (default: 3600).
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "CacheSizing::rag")]
    pub rag: CacheSizing,
    #[serde(default = "CacheSizing::embedding")]
    pub embedding: CacheSizing,
    #[serde(default = "CacheSizing::ml")]
    pub ml: CacheSizing,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            rag: CacheSizing::rag(),
            embedding: CacheSizing::embedding(),
            ml: CacheSizing::ml(),
        }
    }
}

impl CacheSettings {
    /// Effective TTL for `sizing`; `None` means entries never expire.
    pub fn ttl_for(&self, sizing: &CacheSizing) -> Option<Duration> {
        let secs = sizing.ttl_secs.unwrap_or(self.ttl_secs);
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    3600
}

/// Capacity and TTL of one cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSizing {
    pub max_entries: u64,
    /// Overrides `cache.ttl_secs` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

impl CacheSizing {
    fn rag() -> Self {
        Self {
            max_entries: 500,
            ttl_secs: None,
        }
    }

    fn embedding() -> Self {
        Self {
            max_entries: 1000,
            ttl_secs: Some(7200),
        }
    }

    fn ml() -> Self {
        Self {
            max_entries: 200,
            ttl_secs: Some(1800),
        }
    }
}

/// Environment variables read by [`Config::apply_env`], each also accepted
/// with a `HUGINN_` prefix.
pub const ENV_OVERRIDES: [&str; 6] = [
    "LOG_LEVEL",
    "MAX_RETRIES",
    "REQUEST_TIMEOUT_MS",
    "CONFIDENCE_THRESHOLD",
    "CACHE_ENABLED",
    "CACHE_TTL_SECONDS",
];

const ENV_PREFIX: &str = "HUGINN_";

impl Config {
    /// Load configuration from the standard locations, then apply the
    /// process environment.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    /// 4. Defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without consulting the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            HuginnError::Configuration(msg) => {
                HuginnError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| HuginnError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// For each name in [`ENV_OVERRIDES`] the `HUGINN_`-prefixed variable wins
    /// over the bare one. Unparseable values are configuration errors.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).or_else(|| lookup(name));

        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(raw) = get("MAX_RETRIES") {
            self.retry.max_retries = parse_env("MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = get("REQUEST_TIMEOUT_MS") {
            self.retry.request_timeout_ms = parse_env("REQUEST_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = get("CONFIDENCE_THRESHOLD") {
            self.signals.confidence_threshold = parse_env("CONFIDENCE_THRESHOLD", &raw)?;
        }
        if let Some(raw) = get("CACHE_ENABLED") {
            self.cache.enabled = parse_bool("CACHE_ENABLED", &raw)?;
        }
        if let Some(raw) = get("CACHE_TTL_SECONDS") {
            self.cache.ttl_secs = parse_env("CACHE_TTL_SECONDS", &raw)?;
        }
        Ok(())
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.signals.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(HuginnError::Configuration(format!(
                "signals.confidence_threshold must be within [0, 1], got {threshold}"
            )));
        }
        crate::RetryPolicy::from_settings(&self.retry).validate()
    }

    /// Resolve the config file path. `Ok(None)` means no file was found.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

fn parse_env<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        HuginnError::Configuration(format!("invalid value {raw:?} for {name}: {e}"))
    })
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HuginnError::Configuration(format!(
            "invalid value {raw:?} for {name}: expected a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay_ms, 500);
        assert_eq!(config.retry.request_timeout_ms, 30_000);
        assert_eq!(config.signals.confidence_threshold, 0.55);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.rag.max_entries, 500);
        assert_eq!(config.cache.embedding.max_entries, 1000);
        assert_eq!(config.cache.ml.max_entries, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [retry]
            max_retries = 5

            [cache.ml]
            max_entries = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.backoff_factor, 2.0);
        assert_eq!(config.cache.ml.max_entries, 50);
        assert_eq!(config.cache.ml.ttl_secs, None);
        assert_eq!(config.cache.rag.max_entries, 500);
    }

    #[test]
    fn cache_ttl_resolution() {
        let settings = CacheSettings::default();
        assert_eq!(settings.ttl_for(&settings.rag), Some(Duration::from_secs(3600)));
        assert_eq!(settings.ttl_for(&settings.embedding), Some(Duration::from_secs(7200)));
        let no_expiry = CacheSettings {
            ttl_secs: 0,
            ..CacheSettings::default()
        };
        assert_eq!(no_expiry.ttl_for(&no_expiry.rag), None);
    }

    #[test]
    fn prefixed_env_wins() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("MAX_RETRIES", "1"), ("HUGINN_MAX_RETRIES", "7")]))
            .unwrap();
        assert_eq!(config.retry.max_retries, 7);
    }

    #[test]
    fn bare_env_applies() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("LOG_LEVEL", "DEBUG"),
                ("CACHE_ENABLED", "false"),
                ("CACHE_TTL_SECONDS", "60"),
                ("CONFIDENCE_THRESHOLD", "0.4"),
            ]))
            .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.signals.confidence_threshold, 0.4);
    }

    #[test]
    fn invalid_env_is_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("REQUEST_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("REQUEST_TIMEOUT_MS"));
        assert!(config.apply_env(env(&[("CACHE_ENABLED", "maybe")])).is_err());
    }

    #[test]
    fn out_of_range_threshold_fails_validation() {
        let mut config = Config::default();
        config.signals.confidence_threshold = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_explicit_path_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/huginn.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
