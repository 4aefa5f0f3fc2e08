//! Process context: configuration, caches and default policies.

use tracing::info;

use crate::cache::CacheContext;
use crate::config::Config;
use crate::resilience::{
    ResilientOperation, RetryExecutor, RetryPolicy, WeakSignalHandler, resilient_operation,
};
use crate::trace::OperationTrace;
use crate::types::ComponentType;
use crate::version;
use crate::Result;

/// Shared observability and resilience context.
///
/// Built once during process bootstrap and passed to call sites by
/// reference. Hands out traces, retry executors and handlers preconfigured
/// from [`Config`].
///
/// ```rust
/// # use huginn::{Config, Huginn};
/// let huginn = Huginn::builder().config(Config::default()).build()?;
/// let trace = huginn.trace("rag_ask");
/// assert_eq!(trace.name(), "rag_ask");
/// # Ok::<(), huginn::HuginnError>(())
/// ```
#[derive(Debug)]
pub struct Huginn {
    config: Config,
    caches: Option<CacheContext>,
    retry_policy: RetryPolicy,
}

impl Huginn {
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Caches, or `None` when caching is disabled.
    pub fn caches(&self) -> Option<&CacheContext> {
        self.caches.as_ref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn trace(&self, name: impl Into<String>) -> OperationTrace {
        OperationTrace::start(name)
    }

    /// Retry executor for `name` with the configured policy.
    pub fn retry(&self, name: impl Into<String>) -> RetryExecutor {
        RetryExecutor::new(name, self.retry_policy.clone())
    }

    /// Weak-signal handler with the configured thresholds.
    pub fn weak_signal(&self, component: ComponentType) -> Result<WeakSignalHandler> {
        let signals = &self.config.signals;
        WeakSignalHandler::new(
            component,
            signals.confidence_threshold,
            signals.min_data_points,
        )
    }

    pub fn resilient(&self, component: ComponentType) -> ResilientOperation<()> {
        resilient_operation(component)
    }
}

/// Builder for [`Huginn`].
#[derive(Debug, Default)]
pub struct HuginnBuilder {
    config: Option<Config>,
    retry_policy: Option<RetryPolicy>,
    disable_cache: bool,
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` instead of built-in defaults.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the retry policy derived from `[retry]`.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Skip cache allocation regardless of `cache.enabled`.
    pub fn disable_cache(mut self) -> Self {
        self.disable_cache = true;
        self
    }

    /// Validate the configuration and build the context.
    pub fn build(self) -> Result<Huginn> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let retry_policy = match self.retry_policy {
            Some(policy) => policy,
            None => RetryPolicy::from_settings(&config.retry),
        };
        retry_policy.validate()?;

        let caches =
            (config.cache.enabled && !self.disable_cache).then(|| CacheContext::new(&config.cache));

        info!(
            version = version::PKG_VERSION,
            caches = caches.is_some(),
            max_retries = retry_policy.max_retries,
            "huginn context ready"
        );

        Ok(Huginn {
            config,
            caches,
            retry_policy,
        })
    }
}
