//! Caching subsystem.
//!
//! [`CacheContext`] owns the three process caches:
//!
//! - `rag`: answers keyed on normalized questions (500 entries, 1h)
//! - `embedding`: vectors keyed on normalized text (1,000 entries, 2h)
//! - `ml`: model predictions (200 entries, 30m)
//!
//! The context is built once from [`CacheSettings`] by
//! [`Huginn`](crate::Huginn) and handed to call sites by reference.
//! Each [`TtlCache`] is a bounded LRU with TTL (moka) plus hit/miss counters.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{CacheSettings, CacheSizing};
use crate::telemetry;
use crate::trace::OperationTrace;
use crate::types::{DegradationLevel, ErrorClass};

/// Reason recorded when a cached value stands in for a failed live call.
const CACHE_RECOVERY_REASON: &str = "cache_recovery";

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub name: String,
    pub size: u64,
    pub max_size: u64,
    pub hits: u64,
    pub misses: u64,
    /// Hits as a percentage of lookups, rounded to two decimals.
    pub hit_rate: f64,
    /// Entry lifetime in seconds; 0 = no expiry.
    pub ttl: u64,
}

/// Bounded LRU + TTL cache with hit/miss accounting.
pub struct TtlCache<V> {
    name: String,
    entries: Cache<String, V>,
    max_entries: u64,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// `ttl = None` keeps entries until evicted by capacity.
    pub fn new(name: impl Into<String>, max_entries: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(max_entries);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            name: name.into(),
            entries: builder.build(),
            max_entries,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up `key`, counting the hit or miss.
    pub fn get(&self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                debug!(cache = %self.name, key, "cache hit");
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => self.name.clone())
                    .increment(1);
                None
            }
        }
    }

    /// Look up `key` and record the outcome as the trace's `cache_hit`.
    pub fn get_traced(&self, key: &str, trace: &mut OperationTrace) -> Option<V> {
        let value = self.get(key);
        trace.set_cache_hit(value.is_some());
        value
    }

    /// Serve a cached value after the live path failed.
    ///
    /// On a hit the trace is tagged `CACHE_RECOVERY`, marked as a fallback
    /// and raised to at least `mild`. Counters are untouched.
    pub fn recover(&self, key: &str, trace: &mut OperationTrace) -> Option<V> {
        let value = self.entries.get(key)?;
        info!(cache = %self.name, key, "serving cached value after failure");
        trace.set_cache_hit(true);
        trace.trigger_fallback(CACHE_RECOVERY_REASON);
        trace.raise_degradation(DegradationLevel::Mild);
        trace.set_error_class(ErrorClass::CacheRecovery);
        Some(value)
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value);
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.invalidate(key);
    }

    /// Number of live entries.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every entry and reset the counters.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        info!(cache = %self.name, "cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            (hits as f64 / lookups as f64 * 100.0 * 100.0).round() / 100.0
        };
        CacheStats {
            name: self.name.clone(),
            size: self.len(),
            max_size: self.max_entries,
            hits,
            misses,
            hit_rate,
            ttl: self.ttl.map_or(0, |t| t.as_secs()),
        }
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("max_entries", &self.max_entries)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Cache key for `input` within `namespace`.
///
/// Input is trimmed and lowercased first, so `" What is RAG? "` and
/// `"what is rag?"` share a key.
pub fn cache_key(namespace: &str, input: &str) -> String {
    let normalized = input.trim().to_lowercase();
    let mut hasher = DefaultHasher::new();
    namespace.hash(&mut hasher);
    normalized.hash(&mut hasher);
    format!("{namespace}:{:016x}", hasher.finish())
}

/// The process-wide caches, constructed once and passed by reference.
#[derive(Debug)]
pub struct CacheContext {
    pub rag: TtlCache<Value>,
    pub embedding: TtlCache<Vec<f32>>,
    pub ml: TtlCache<Value>,
}

impl CacheContext {
    pub fn new(settings: &CacheSettings) -> Self {
        let build = |name: &str, sizing: &CacheSizing| {
            let ttl = settings.ttl_for(sizing);
            info!(
                cache = name,
                max_size = sizing.max_entries,
                ttl_secs = ttl.map_or(0, |t| t.as_secs()),
                "cache initialized"
            );
            (sizing.max_entries, ttl)
        };
        let (rag_max, rag_ttl) = build("rag", &settings.rag);
        let (emb_max, emb_ttl) = build("embedding", &settings.embedding);
        let (ml_max, ml_ttl) = build("ml", &settings.ml);
        Self {
            rag: TtlCache::new("rag", rag_max, rag_ttl),
            embedding: TtlCache::new("embedding", emb_max, emb_ttl),
            ml: TtlCache::new("ml", ml_max, ml_ttl),
        }
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        vec![self.rag.stats(), self.embedding.stats(), self.ml.stats()]
    }

    pub fn clear_all(&self) {
        self.rag.clear();
        self.embedding.clear();
        self.ml.clear();
    }
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::new(&CacheSettings::default())
    }
}
