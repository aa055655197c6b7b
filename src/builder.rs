//! Cache System Builder
//!
//! Wires the health monitor, connection manager, local store, and façade
//! together.
//!
//! # Example: From Environment
//!
//! ```rust,no_run
//! use resilient_cache::{CacheConfig, CacheSystemBuilder};
//!
//! fn main() -> anyhow::Result<()> {
//!     let cache = CacheSystemBuilder::new()
//!         .with_config(CacheConfig::from_env()?)
//!         .build()?;
//!     Ok(())
//! }
//! ```
//!
//! # Example: Custom Remote
//!
//! ```rust,ignore
//! use resilient_cache::CacheSystemBuilder;
//! use std::sync::Arc;
//!
//! let cache = CacheSystemBuilder::new()
//!     .with_connector(Arc::new(MyConnector::new()))
//!     .build()?;
//! ```

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::backends::LocalStore;
use crate::cache_manager::CacheManager;
use crate::config::CacheConfig;
use crate::connection::ConnectionManager;
use crate::health::HealthMonitor;
use crate::invalidation::Invalidator;
use crate::observer::{CacheObserver, TracingObserver};
use crate::traits::Connector;
use crate::CacheSystem;

/// Builder for [`CacheSystem`]
///
/// # Default Behavior
///
/// - Remote: Redis when `config.redis` is set, otherwise local-only
/// - Observer: [`TracingObserver`]
pub struct CacheSystemBuilder {
    config: CacheConfig,
    connector: Option<Arc<dyn Connector>>,
    observer: Option<Arc<dyn CacheObserver>>,
    local_only: bool,
}

impl CacheSystemBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            connector: None,
            observer: None,
            local_only: false,
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom remote instead of the configured Redis
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Report swallowed failures and hits/misses to a custom sink
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Ignore any remote configuration and serve from the local store only
    #[must_use]
    pub fn local_only(mut self) -> Self {
        self.local_only = true;
        self
    }

    /// Build the cache system
    ///
    /// No connection is opened here; the remote is dialed lazily on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the Redis URL
    /// cannot be parsed.
    pub fn build(self) -> Result<CacheSystem> {
        let Self {
            config,
            connector,
            observer,
            local_only,
        } = self;
        config.validate()?;

        let connector = if local_only {
            None
        } else if let Some(connector) = connector {
            info!(connector = connector.name(), "Using custom remote connector");
            Some(connector)
        } else {
            default_connector(&config)?
        };

        let health = Arc::new(HealthMonitor::new(config.health));
        let connection = Arc::new(ConnectionManager::new(connector, health, config.connection));
        let observer = observer.unwrap_or_else(|| Arc::new(TracingObserver));

        let cache_manager = Arc::new(
            CacheManager::with_observer(Arc::new(LocalStore::new()), connection, observer)
                .default_ttl(config.default_ttl)
                .single_flight(config.single_flight),
        );
        let invalidator = Invalidator::new(Arc::clone(&cache_manager));

        info!(
            default_ttl_secs = config.default_ttl.as_secs(),
            single_flight = config.single_flight,
            "Cache system built"
        );

        Ok(CacheSystem {
            cache_manager,
            invalidator,
        })
    }
}

#[cfg(feature = "redis")]
fn default_connector(config: &CacheConfig) -> Result<Option<Arc<dyn Connector>>> {
    match &config.redis {
        Some(redis) => {
            let connector = crate::backends::RedisConnector::new(&redis.url)?;
            Ok(Some(Arc::new(connector)))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "redis"))]
#[allow(clippy::unnecessary_wraps)]
fn default_connector(config: &CacheConfig) -> Result<Option<Arc<dyn Connector>>> {
    if config.redis.is_some() {
        tracing::warn!("Redis configured but the `redis` feature is disabled, running local-only");
    }
    Ok(None)
}

impl Default for CacheSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}
