//! Cache Manager - Cache-Aside Façade
//!
//! The one API every call site uses. Writes always land in the local store
//! first, reads prefer the remote cache, and nothing below this boundary can
//! fail a caller except its own `compute` function.
//!
//! ```text
//! get:  Remote ─hit→ return
//!         └─miss/error/corrupt→ Local ─hit→ return
//!                                  └─miss→ None
//! set:  Local (always) → Remote (best effort)
//! ```

use dashmap::DashMap;
use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::backends::{LocalStore, LocalStoreStats};
use crate::config::DEFAULT_TTL;
use crate::connection::ConnectionManager;
use crate::error::{CacheError, CacheResult};
use crate::health::{HealthMonitor, HealthSnapshot};
use crate::observer::{CacheEvent, CacheObserver, Operation, TracingObserver};

/// RAII cleanup guard for in-flight computation tracking
///
/// Each caller queued on a key holds one clone of the key's lock. The map
/// entry is removed only by the last holder, so a caller arriving while
/// waiters are still queued joins the same queue instead of starting a
/// parallel computation. Runs on early return, cancellation, or panic.
struct CleanupGuard<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        // Map entry plus our own clone: nobody else is queued.
        self.map.remove_if(&self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) <= 2
        });
    }
}

/// TTL presets for content-API responses
#[derive(Debug, Clone, Copy)]
pub enum CacheStrategy {
    /// Trending lists - 5 minutes TTL
    ShortTerm,
    /// Details pages - 30 minutes TTL
    MediumTerm,
    /// Default strategy - 1 hour TTL
    Default,
    /// Genres, configuration, rarely changing lookups - 24 hours TTL
    LongTerm,
    /// Custom TTL
    Custom(Duration),
}

impl CacheStrategy {
    /// Convert strategy to duration
    #[must_use]
    pub fn to_duration(&self) -> Duration {
        match self {
            Self::ShortTerm => Duration::from_secs(300),
            Self::MediumTerm => Duration::from_secs(1800),
            Self::Default => DEFAULT_TTL,
            Self::LongTerm => Duration::from_secs(86_400),
            Self::Custom(duration) => *duration,
        }
    }
}

/// Reachability of the remote cache as seen by the admin surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Remote reachable and answering
    Online,
    /// Remote disabled, blocked, unconfigured, or unreachable
    Offline,
    /// Remote reachable but the stats query failed
    Error,
}

/// Aggregate statistics for the admin surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheServerStats {
    pub status: CacheStatus,
    /// Approximate number of remote keys
    pub key_count: u64,
    pub memory_used_bytes: u64,
    pub memory_used_human: String,
    pub uptime_secs: u64,
    /// Remote keyspace hit rate, percent
    pub hit_rate: f64,
    /// Local fallback store counters
    pub local: LocalStoreStats,
    pub health: HealthSnapshot,
}

/// In-process request counters
#[derive(Debug, Clone)]
pub struct CacheManagerStats {
    pub total_requests: u64,
    pub remote_hits: u64,
    pub local_hits: u64,
    pub total_hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub remote_errors: u64,
    pub computes: u64,
    pub coalesced_requests: u64,
    pub in_flight_requests: usize,
}

/// Cache-aside façade over the remote cache and the local fallback store
pub struct CacheManager {
    local: Arc<LocalStore>,
    connection: Arc<ConnectionManager>,
    observer: Arc<dyn CacheObserver>,
    default_ttl: Duration,
    single_flight: bool,
    /// Statistics
    total_requests: AtomicU64,
    remote_hits: AtomicU64,
    local_hits: AtomicU64,
    misses: AtomicU64,
    remote_errors: AtomicU64,
    computes: AtomicU64,
    coalesced_requests: AtomicU64,
    /// In-flight computations, keyed by cache key
    in_flight_requests: DashMap<String, Arc<Mutex<()>>>,
}

impl CacheManager {
    /// Create a façade with the default tracing observer
    pub fn new(local: Arc<LocalStore>, connection: Arc<ConnectionManager>) -> Self {
        Self::with_observer(local, connection, Arc::new(TracingObserver))
    }

    /// Create a façade reporting swallowed failures to `observer`
    pub fn with_observer(
        local: Arc<LocalStore>,
        connection: Arc<ConnectionManager>,
        observer: Arc<dyn CacheObserver>,
    ) -> Self {
        info!(
            remote = connection.has_remote(),
            "Initializing Cache Manager"
        );

        Self {
            local,
            connection,
            observer,
            default_ttl: DEFAULT_TTL,
            single_flight: true,
            total_requests: AtomicU64::new(0),
            remote_hits: AtomicU64::new(0),
            local_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            remote_errors: AtomicU64::new(0),
            computes: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            in_flight_requests: DashMap::new(),
        }
    }

    /// Override the TTL used by [`set`](Self::set)
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enable or disable coalescing of concurrent `get_or_set` misses
    #[must_use]
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Local fallback store
    pub fn local(&self) -> &Arc<LocalStore> {
        &self.local
    }

    /// Remote connection manager
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Breaker guarding the remote cache
    pub fn health(&self) -> &Arc<HealthMonitor> {
        self.connection.health()
    }

    /// Get a value, remote first, then the local store
    ///
    /// # Returns
    /// * `Some(value)` - Found in either tier and deserialized as `T`
    /// * `None` - Absent, expired, or not decodable as `T` in both tiers
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if let Some(client) = self.connection.get_client().await {
            match client.get(key).await {
                Ok(Some(raw)) => {
                    self.connection.report_success();
                    match serde_json::from_str::<T>(&raw) {
                        Ok(value) => {
                            self.remote_hits.fetch_add(1, Ordering::Relaxed);
                            self.observer.on_event(&CacheEvent::RemoteHit { key });
                            return Some(value);
                        }
                        Err(e) => {
                            let error = e.to_string();
                            self.observer.on_event(&CacheEvent::CorruptEntry {
                                key,
                                error: &error,
                            });
                        }
                    }
                }
                Ok(None) => self.connection.report_success(),
                Err(e) => self.remote_failed(Operation::Get, Some(key), &e).await,
            }
        }

        if let Some(value) = self.local.get::<T>(key) {
            self.local_hits.fetch_add(1, Ordering::Relaxed);
            self.observer.on_event(&CacheEvent::LocalHit { key });
            return Some(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.observer.on_event(&CacheEvent::Miss { key });
        None
    }

    /// Store a value with the default TTL
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`] if `value` cannot be encoded.
    /// Remote failures are never returned.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> CacheResult<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Store a value using a TTL preset
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`] if `value` cannot be encoded.
    pub async fn set_with_strategy<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        strategy: CacheStrategy,
    ) -> CacheResult<()> {
        self.set_with_ttl(key, value, strategy.to_duration()).await
    }

    /// Store a value in the local store, then best-effort in the remote cache
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`] if `value` cannot be encoded.
    /// Nothing is written in that case.
    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        let serialized = serde_json::to_string(value)?;
        self.store(key, serialized, ttl).await;
        Ok(())
    }

    /// Write an already-serialized value: local unconditionally, remote best-effort
    async fn store(&self, key: &str, serialized: String, ttl: Duration) {
        // Local first: a `get` must see the new value even while the remote
        // write is in flight or has failed.
        self.local.set(key, serialized.clone(), ttl);

        let remote_ok = match self.connection.get_client().await {
            Some(client) => match client.set_ex(key, &serialized, ttl).await {
                Ok(()) => {
                    self.connection.report_success();
                    true
                }
                Err(e) => {
                    self.remote_failed(Operation::Set, Some(key), &e).await;
                    false
                }
            },
            None => false,
        };

        self.observer.on_event(&CacheEvent::Stored {
            key,
            ttl,
            remote: remote_ok,
        });
    }

    /// Remove a key from both tiers
    pub async fn delete(&self, key: &str) {
        self.local.remove(key);

        if let Some(client) = self.connection.get_client().await {
            match client.del(&[key.to_string()]).await {
                Ok(_) => self.connection.report_success(),
                Err(e) => self.remote_failed(Operation::Delete, Some(key), &e).await,
            }
        }
    }

    /// Remove several keys from both tiers concurrently
    pub async fn delete_many(&self, keys: &[String]) {
        join_all(keys.iter().map(|key| self.delete(key))).await;
    }

    /// Empty both tiers
    pub async fn clear(&self) {
        self.local.clear();

        if let Some(client) = self.connection.get_client().await {
            match client.flush().await {
                Ok(()) => self.connection.report_success(),
                Err(e) => self.remote_failed(Operation::Clear, None, &e).await,
            }
        }
        info!("Cache cleared");
    }

    /// Get a cached value or compute, store, and return it
    ///
    /// A hit returns without calling `compute`. On a miss `compute` runs once;
    /// storing its result is best-effort and never fails the call. With
    /// single-flight enabled, concurrent misses for the same key wait for the
    /// first computation and read its stored result. If that computation
    /// fails, the next queued caller computes; at most one computation per key
    /// runs at a time.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns, unchanged.
    ///
    /// # Example
    /// ```rust,ignore
    /// let details: serde_json::Value = cache_manager
    ///     .get_or_set("movie:27205:details", || async {
    ///         tmdb.movie_details(27205).await
    ///     }, Duration::from_secs(1800))
    ///     .await?;
    /// ```
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl: Duration,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        if let Some(value) = self.get::<T>(key).await {
            return Ok(value);
        }

        if !self.single_flight {
            return self.compute_and_store(key, compute, ttl).await;
        }

        let key_owned = key.to_string();
        let lock = self
            .in_flight_requests
            .entry(key_owned.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        // Registered before waiting so a cancelled waiter still releases its slot
        let cleanup_guard = CleanupGuard {
            map: &self.in_flight_requests,
            key: key_owned,
            lock,
        };
        // Declared after the cleanup guard: the lock is released before the
        // guard checks for remaining holders.
        let _permit = cleanup_guard.lock.lock().await;

        // Double-check after acquiring the lock; another task may have stored it
        if let Some(value) = self.get::<T>(key).await {
            self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
            self.observer.on_event(&CacheEvent::Coalesced { key });
            return Ok(value);
        }

        self.compute_and_store(key, compute, ttl).await
    }

    /// [`get_or_set`](Self::get_or_set) with a TTL preset
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns, unchanged.
    pub async fn get_or_set_with_strategy<T, E, F, Fut>(
        &self,
        key: &str,
        strategy: CacheStrategy,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        self.get_or_set(key, compute, strategy.to_duration()).await
    }

    async fn compute_and_store<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl: Duration,
    ) -> Result<T, E>
    where
        T: Serialize + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        self.computes.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Computing value for cache miss");

        let value = compute().await?;

        match serde_json::to_string(&value) {
            Ok(serialized) => self.store(key, serialized, ttl).await,
            Err(e) => {
                let error = CacheError::from(e);
                self.observer.on_event(&CacheEvent::RemoteFailure {
                    operation: Operation::Set,
                    key: Some(key),
                    error: &error,
                });
            }
        }

        Ok(value)
    }

    /// List keys matching a glob pattern
    ///
    /// Uses the remote keyspace when reachable, otherwise the local store.
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        if let Some(client) = self.connection.get_client().await {
            match client.scan(pattern).await {
                Ok(keys) => {
                    self.connection.report_success();
                    return keys;
                }
                Err(e) => self.remote_failed(Operation::Keys, None, &e).await,
            }
        }
        self.local.keys_matching(pattern)
    }

    /// Delete every key matching a glob pattern, returning how many were targeted
    pub async fn delete_matching(&self, pattern: &str) -> usize {
        let mut keys = self.keys(pattern).await;
        keys.extend(self.local.keys_matching(pattern));
        keys.sort();
        keys.dedup();

        self.delete_many(&keys).await;
        info!(pattern = %pattern, count = keys.len(), "Invalidated keys matching pattern");
        keys.len()
    }

    /// Aggregate statistics for the admin surface
    ///
    /// Never fails: an unreachable remote yields zeroed values with
    /// [`CacheStatus::Offline`].
    pub async fn server_stats(&self) -> CacheServerStats {
        let mut stats = CacheServerStats {
            status: CacheStatus::Offline,
            key_count: 0,
            memory_used_bytes: 0,
            memory_used_human: "0B".to_string(),
            uptime_secs: 0,
            hit_rate: 0.0,
            local: self.local.stats(),
            health: self.health().snapshot(),
        };

        let Some(client) = self.connection.get_client().await else {
            return stats;
        };

        match client.server_info().await {
            Ok(info) => {
                self.connection.report_success();
                stats.status = CacheStatus::Online;
                stats.hit_rate = info.hit_rate();
                stats.key_count = info.key_count;
                stats.memory_used_bytes = info.used_memory_bytes;
                stats.memory_used_human = info.used_memory_human;
                stats.uptime_secs = info.uptime_secs;
            }
            Err(e) => {
                self.remote_failed(Operation::Stats, None, &e).await;
                stats.status = CacheStatus::Error;
            }
        }
        stats.health = self.health().snapshot();
        stats
    }

    /// Probe the remote cache
    ///
    /// Returns `true` when the remote answers a ping. The local store is
    /// always available, so `false` means degraded rather than down.
    pub async fn health_check(&self) -> bool {
        let Some(client) = self.connection.get_client().await else {
            return false;
        };
        match client.ping().await {
            Ok(()) => {
                self.connection.report_success();
                true
            }
            Err(e) => {
                self.remote_failed(Operation::Ping, None, &e).await;
                false
            }
        }
    }

    /// Get in-process request statistics
    #[allow(clippy::cast_precision_loss)]
    pub fn get_stats(&self) -> CacheManagerStats {
        let total_reqs = self.total_requests.load(Ordering::Relaxed);
        let remote_hits = self.remote_hits.load(Ordering::Relaxed);
        let local_hits = self.local_hits.load(Ordering::Relaxed);

        CacheManagerStats {
            total_requests: total_reqs,
            remote_hits,
            local_hits,
            total_hits: remote_hits + local_hits,
            misses: self.misses.load(Ordering::Relaxed),
            hit_rate: if total_reqs > 0 {
                ((remote_hits + local_hits) as f64 / total_reqs as f64) * 100.0
            } else {
                0.0
            },
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            computes: self.computes.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            in_flight_requests: self.in_flight_requests.len(),
        }
    }

    async fn remote_failed(&self, operation: Operation, key: Option<&str>, error: &CacheError) {
        self.remote_errors.fetch_add(1, Ordering::Relaxed);
        self.observer.on_event(&CacheEvent::RemoteFailure {
            operation,
            key,
            error,
        });
        self.connection.report_error(error).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_durations() {
        assert_eq!(CacheStrategy::ShortTerm.to_duration(), Duration::from_secs(300));
        assert_eq!(CacheStrategy::Default.to_duration(), DEFAULT_TTL);
        assert_eq!(
            CacheStrategy::Custom(Duration::from_secs(42)).to_duration(),
            Duration::from_secs(42)
        );
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&CacheStatus::Offline).unwrap(), r#""offline""#);
    }
}
