//! Resilient Cache
//!
//! A cache-aside layer for services that proxy a rate-limited upstream API:
//! - **Remote tier**: Redis, shared across instances
//! - **Local fallback**: in-process expiring store, always written, read whenever
//!   the remote yields nothing
//! - **Circuit breaker**: backs off from Redis when it runs out of client slots
//! - **Single-flight `get_or_set`**: concurrent misses share one computation
//! - **Invalidation helpers**: domain events mapped to key deletes
//!
//! Remote unavailability is never visible to callers; the only error that
//! crosses the façade is the caller's own `compute` failure.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use resilient_cache::CacheSystem;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheSystem::from_env()?;
//!
//!     let details: serde_json::Value = cache
//!         .cache_manager()
//!         .get_or_set(
//!             "movie:27205:details",
//!             || async { Ok::<_, anyhow::Error>(serde_json::json!({"title": "Inception"})) },
//!             Duration::from_secs(1800),
//!         )
//!         .await?;
//!
//!     cache.invalidator().invalidate_movie(27205).await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! CacheManager ─→ ConnectionManager ─(gated by)→ HealthMonitor
//!      │                 └─→ RemoteConnection (Redis)
//!      └─→ LocalStore (always written, fallback reads)
//! ```

use std::sync::Arc;
use anyhow::Result;
use tracing::{info, warn};

pub mod backends;
pub mod builder;
pub mod cache_manager;
pub mod config;
pub mod connection;
pub mod error;
pub mod health;
pub mod invalidation;
pub mod observer;
pub mod traits;

pub use backends::{LocalStore, LocalStoreStats};
#[cfg(feature = "redis")]
pub use backends::{RedisConnection, RedisConnector};
pub use builder::CacheSystemBuilder;
pub use cache_manager::{
    CacheManager, CacheManagerStats, CacheServerStats, CacheStatus, CacheStrategy,
};
pub use config::{CacheConfig, DEFAULT_TTL, RedisConfig};
pub use connection::{ConnectionConfig, ConnectionManager};
pub use error::{CacheError, CacheResult};
pub use health::{HealthConfig, HealthMonitor, HealthSnapshot, HealthStatus};
pub use invalidation::{
    ENTITY_ASPECTS, EntityKind, HOME_KEYS, InvalidationTarget, Invalidator, entity_key, entity_keys,
};
pub use observer::{CacheEvent, CacheObserver, Operation, TracingObserver};
pub use traits::{Connector, RemoteConnection, RemoteServerInfo};

// Re-export async_trait for implementors of the remote traits
pub use async_trait::async_trait;

/// Main entry point for the cache
///
/// Cloning is cheap; every clone shares the same façade, breaker, and
/// connection.
///
/// # Example
///
/// ```rust,no_run
/// use resilient_cache::CacheSystem;
///
/// # fn example() -> anyhow::Result<()> {
/// let cache = CacheSystem::with_redis_url("redis://127.0.0.1:6379")?;
/// let manager = cache.cache_manager();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CacheSystem {
    /// Cache-aside façade (primary interface)
    pub cache_manager: Arc<CacheManager>,
    /// Domain-event invalidation helpers bound to the same façade
    pub invalidator: Invalidator,
}

impl CacheSystem {
    /// Create a cache system configured from environment variables
    ///
    /// See [`CacheConfig`] for the variables read. Without any `REDIS_*`
    /// variable the cache runs local-only.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed.
    pub fn from_env() -> Result<Self> {
        info!("Initializing cache system from environment");
        CacheSystemBuilder::new()
            .with_config(CacheConfig::from_env()?)
            .build()
    }

    /// Create a cache system backed by the Redis instance at `redis_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn with_redis_url(redis_url: &str) -> Result<Self> {
        let config = CacheConfig {
            redis: Some(RedisConfig::from_url(redis_url)),
            ..CacheConfig::default()
        };
        CacheSystemBuilder::new().with_config(config).build()
    }

    /// Create a cache system that never contacts a remote
    ///
    /// # Errors
    ///
    /// Infallible with the default configuration; kept fallible for symmetry.
    pub fn local_only() -> Result<Self> {
        CacheSystemBuilder::new().local_only().build()
    }

    /// Probe the remote cache
    ///
    /// Returns `true` when the remote answers. `false` means the system is
    /// degraded to the local store, which still serves every operation.
    pub async fn health_check(&self) -> bool {
        let remote_ok = self.cache_manager.health_check().await;
        if remote_ok {
            info!("Cache health check passed");
        } else {
            warn!(
                breaker = ?self.cache_manager.health().status(),
                "Cache health check - remote unavailable, serving from local store"
            );
        }
        remote_ok
    }

    /// Get reference to the cache manager (primary interface)
    pub fn cache_manager(&self) -> &Arc<CacheManager> {
        &self.cache_manager
    }

    /// Get reference to the invalidation helpers
    pub fn invalidator(&self) -> &Invalidator {
        &self.invalidator
    }

    /// Close the remote connection
    pub async fn shutdown(&self) {
        self.cache_manager.connection().disconnect().await;
    }
}
