//! Cache Observer
//!
//! Failures below the façade are never returned to callers. They are reported
//! here instead, so operators keep visibility without breaking the
//! "never fail the caller" contract.

use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::error::CacheError;

/// Façade operation that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Set,
    Delete,
    Clear,
    Keys,
    Stats,
    Ping,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Delete => "delete",
            Self::Clear => "clear",
            Self::Keys => "keys",
            Self::Stats => "stats",
            Self::Ping => "ping",
        };
        f.write_str(name)
    }
}

/// Something worth recording that happened inside the façade
#[derive(Debug)]
pub enum CacheEvent<'a> {
    /// Served from the remote cache
    RemoteHit { key: &'a str },
    /// Served from the local fallback store
    LocalHit { key: &'a str },
    /// Absent in both tiers
    Miss { key: &'a str },
    /// Written; `remote` tells whether the remote write succeeded
    Stored { key: &'a str, ttl: Duration, remote: bool },
    /// A remote value did not deserialize and was skipped
    CorruptEntry { key: &'a str, error: &'a str },
    /// A remote operation failed and was swallowed
    RemoteFailure {
        operation: Operation,
        key: Option<&'a str>,
        error: &'a CacheError,
    },
    /// A caller waited on another task's computation instead of computing
    Coalesced { key: &'a str },
}

/// Sink for cache events
///
/// Implementations must be cheap; they run inline on request paths.
pub trait CacheObserver: Send + Sync {
    fn on_event(&self, event: &CacheEvent<'_>);
}

/// Default observer forwarding events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn on_event(&self, event: &CacheEvent<'_>) {
        match event {
            CacheEvent::RemoteHit { key } => trace!(key = %key, "[Remote] Cache hit"),
            CacheEvent::LocalHit { key } => trace!(key = %key, "[Local] Cache hit"),
            CacheEvent::Miss { key } => trace!(key = %key, "Cache miss"),
            CacheEvent::Stored { key, ttl, remote } => {
                debug!(key = %key, ttl_secs = ttl.as_secs(), remote = *remote, "Cached value");
            }
            CacheEvent::CorruptEntry { key, error } => {
                warn!(
                    key = %key,
                    error = %error,
                    "Skipping cache entry that failed to deserialize"
                );
            }
            CacheEvent::RemoteFailure {
                operation,
                key,
                error,
            } => {
                warn!(
                    operation = %operation,
                    key = key.unwrap_or("-"),
                    error = %error,
                    "Remote cache operation failed, continuing with local store"
                );
            }
            CacheEvent::Coalesced { key } => {
                debug!(key = %key, "Waited for in-flight computation");
            }
        }
    }
}
