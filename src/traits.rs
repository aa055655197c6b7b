//! Remote Cache Traits
//!
//! The seam between the façade and the remote key-value service.
//!
//! # Architecture
//!
//! - `Connector`: establishes one connection to the remote service
//! - `RemoteConnection`: the live handle the connection manager shares across requests
//!
//! The Redis implementation lives in [`crate::backends::redis_cache`]. Tests and
//! alternative deployments can plug in their own implementations.
//!
//! # Example: Custom Remote
//!
//! ```rust,ignore
//! use resilient_cache::{Connector, RemoteConnection, CacheResult, async_trait};
//! use std::sync::Arc;
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn connect(&self) -> CacheResult<Arc<dyn RemoteConnection>> {
//!         // Dial your service here
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheResult;

/// Live handle to the remote cache service
///
/// Values are exchanged as serialized strings; the façade owns encoding.
///
/// # Thread Safety
///
/// One handle is shared by every request task, so implementations must be
/// `Send + Sync` and usable through `&self`.
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Whether the handle still believes its connection is usable
    ///
    /// A handle that returns `false` is discarded and replaced on the next
    /// acquisition.
    fn is_open(&self) -> bool;

    /// Read a serialized value
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - Key present
    /// * `Ok(None)` - Key absent or expired
    /// * `Err(e)` - Remote operation failed
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a serialized value with a time-to-live
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> CacheResult<usize>;

    /// Remove every key in the selected database
    async fn flush(&self) -> CacheResult<()>;

    /// List keys matching a glob-style pattern
    async fn scan(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Collect server statistics for the admin surface
    async fn server_info(&self) -> CacheResult<RemoteServerInfo>;

    /// Round-trip liveness check
    async fn ping(&self) -> CacheResult<()>;

    /// Close the connection
    async fn disconnect(&self) -> CacheResult<()>;

    /// Name used in logs
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Factory for remote connections
///
/// Called by the connection manager under its acquisition lock, so at most
/// one `connect` is in flight per manager.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection to the remote service
    async fn connect(&self) -> CacheResult<Arc<dyn RemoteConnection>>;

    /// Name used in logs
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Raw statistics reported by the remote service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteServerInfo {
    /// Approximate number of keys in the selected database
    pub key_count: u64,
    /// Bytes used by the server
    pub used_memory_bytes: u64,
    /// Human-readable memory usage as reported by the server
    pub used_memory_human: String,
    /// Server uptime in seconds
    pub uptime_secs: u64,
    /// Lookups that found a key
    pub keyspace_hits: u64,
    /// Lookups that missed
    pub keyspace_misses: u64,
}

impl RemoteServerInfo {
    /// Remote hit rate as a percentage
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.keyspace_hits + self.keyspace_misses;
        if total == 0 {
            0.0
        } else {
            (self.keyspace_hits as f64 / total as f64) * 100.0
        }
    }
}
