//! Local Store - In-Process Fallback Backend
//!
//! An always-available expiring key-value map using `DashMap` for concurrent
//! access. Every façade write lands here first, and every read falls back to
//! it when the remote path yields nothing.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Cache entry with expiration tracking
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Point-in-time counters of a [`LocalStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStoreStats {
    /// Entries currently held, expired ones included until purged
    pub entries: usize,
    pub hits: u64,
    /// Lookups of absent or expired keys
    pub misses: u64,
    pub sets: u64,
}

/// Concurrent expiring map used as the fallback tier
///
/// **Features**:
/// - Lock-free concurrent reads/writes
/// - Per-entry TTL, purged lazily on access or by [`cleanup_expired`](Self::cleanup_expired)
///
/// **Limitations**:
/// - No eviction policy beyond expiry (not an LRU)
/// - No size limit
///
/// **Example**:
/// ```rust
/// use resilient_cache::backends::LocalStore;
/// use std::time::Duration;
///
/// # async fn example() {
/// let store = LocalStore::new();
/// let details = r#"{"title":"Fight Club"}"#.to_string();
/// store.set("movie:550:details", details, Duration::from_secs(60));
/// let cached: Option<serde_json::Value> = store.get("movie:550:details");
/// assert!(cached.is_some());
/// # }
/// ```
pub struct LocalStore {
    /// Concurrent `HashMap`
    map: Arc<DashMap<String, CacheEntry>>,
    /// Hit counter
    hits: Arc<AtomicU64>,
    /// Miss counter
    misses: Arc<AtomicU64>,
    /// Set counter
    sets: Arc<AtomicU64>,
}

impl LocalStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: Arc::new(DashMap::new()),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Store a serialized value, overwriting any previous entry
    pub fn set(&self, key: &str, value: String, ttl: Duration) {
        self.map.insert(key.to_string(), CacheEntry::new(value, ttl));
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, ttl_secs = %ttl.as_secs(), "[Local] Cached key with TTL");
    }

    /// Read the serialized value, purging it if expired
    pub fn get_raw(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.map.get(key) {
            if entry.is_expired(now) {
                drop(entry); // Release read lock
                self.map.remove_if(key, |_, entry| entry.is_expired(now));
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Read and deserialize a value
    ///
    /// A stored value that does not parse as `T` is reported as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key = %key, error = %e, "[Local] Ignoring entry that failed to deserialize");
                None
            }
        }
    }

    /// Remove one entry
    pub fn remove(&self, key: &str) {
        self.map.remove(key);
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.map.clear();
        debug!("[Local] Cleared all entries");
    }

    /// Drop expired entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.map.retain(|_, entry| {
            if entry.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(count = removed, "[Local] Cleaned up expired entries");
        }
        removed
    }

    /// Live keys matching a glob pattern (`*` and `?`)
    pub fn keys_matching(&self, pattern: &str) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .map
            .iter()
            .filter(|entry| !entry.value().is_expired(now) && glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Current number of entries, expired ones included until purged
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entry count plus hit/miss/set counters since creation
    pub fn stats(&self) -> LocalStoreStats {
        LocalStoreStats {
            entries: self.map.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
        }
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Redis-style glob match supporting `*` and `?`
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some(p);
                resume = t;
                p += 1;
            }
            Some(c) if *c == '?' || Some(c) == text.get(t) => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some(star_pos) => {
                    p = star_pos + 1;
                    resume += 1;
                    t = resume;
                }
                None => return false,
            },
        }
    }

    pattern.get(p..).is_some_and(|rest| rest.iter().all(|c| *c == '*'))
}
