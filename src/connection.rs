//! Connection Manager - Shared Remote Handle
//!
//! Owns the single connection to the remote cache service and hands out
//! clones of it. Every failure path degrades to `None`, which the façade reads
//! as "use the local store only".
//!
//! Acquisition, reconnection, and error bookkeeping all run inside one
//! `tokio::sync::Mutex` critical section so that concurrent requests never
//! dial an exhausted server in parallel.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{CacheError, CacheResult};
use crate::health::HealthMonitor;
use crate::traits::{Connector, RemoteConnection};

/// Configuration for [`ConnectionManager`]
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Upper bound for a single connect attempt
    pub connect_timeout: Duration,
    /// Connect attempts per acquisition before giving up
    pub max_connect_attempts: u32,
    /// Delay unit between attempts, multiplied by the attempt number
    pub backoff_base: Duration,
    /// Cap on the delay between attempts
    pub max_backoff: Duration,
    /// Block window after a connection-level failure; doubled for max-clients
    pub block_duration: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            max_connect_attempts: 3,
            backoff_base: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            block_duration: Duration::from_secs(30),
        }
    }
}

impl ConnectionConfig {
    /// Delay before retry number `attempt` (1-based), capped, with up to 10% jitter
    fn backoff_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff_base.saturating_mul(attempt).min(self.max_backoff);
        let jitter_ceiling = u64::try_from(delay.as_millis() / 10).unwrap_or(0);
        let jitter = if jitter_ceiling == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ceiling)
        };
        (delay + Duration::from_millis(jitter)).min(self.max_backoff)
    }
}

#[derive(Default)]
struct ConnectionState {
    handle: Option<Arc<dyn RemoteConnection>>,
    blocked_until: Option<Instant>,
}

impl ConnectionState {
    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

/// Lazily (re)connecting owner of the shared remote handle
pub struct ConnectionManager {
    /// `None` runs the cache in local-only mode
    connector: Option<Arc<dyn Connector>>,
    health: Arc<HealthMonitor>,
    config: ConnectionConfig,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    /// Create a manager; no connection is opened until the first acquisition
    pub fn new(
        connector: Option<Arc<dyn Connector>>,
        health: Arc<HealthMonitor>,
        config: ConnectionConfig,
    ) -> Self {
        let connect_timeout_ms =
            u64::try_from(config.connect_timeout.as_millis()).unwrap_or(u64::MAX);
        match &connector {
            Some(connector) => info!(
                connector = connector.name(),
                connect_timeout_ms,
                "Remote cache connection manager initialized (lazy connect)"
            ),
            None => info!("No remote cache configured, running with local store only"),
        }

        Self {
            connector,
            health,
            config,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    /// Shared health monitor
    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Whether a remote connector is configured at all
    pub fn has_remote(&self) -> bool {
        self.connector.is_some()
    }

    /// Acquire the shared remote handle, connecting if needed
    ///
    /// # Returns
    ///
    /// * `Some(handle)` - Remote is usable
    /// * `None` - Remote is disabled, blocked, unconfigured, or unreachable
    pub async fn get_client(&self) -> Option<Arc<dyn RemoteConnection>> {
        let connector = self.connector.as_ref()?;

        if !self.health.should_use_redis() {
            return None;
        }

        let mut state = self.state.lock().await;

        if state.is_blocked(Instant::now()) {
            return None;
        }

        if let Some(handle) = &state.handle {
            if handle.is_open() {
                return Some(Arc::clone(handle));
            }
        }

        if let Some(stale) = state.handle.take() {
            debug!(remote = stale.name(), "Discarding closed remote cache handle");
            if let Err(e) = stale.disconnect().await {
                debug!(error = %e, "Ignoring error while disconnecting stale handle");
            }
        }

        match self.connect_with_backoff(connector.as_ref()).await {
            Ok(handle) => {
                self.health.record_success();
                info!(remote = handle.name(), "Connected to remote cache");
                state.handle = Some(Arc::clone(&handle));
                Some(handle)
            }
            Err(e) => {
                self.apply_error(&mut state, &e).await;
                None
            }
        }
    }

    /// Feed back an error returned by a command on an acquired handle
    pub async fn report_error(&self, error: &CacheError) {
        let mut state = self.state.lock().await;
        self.apply_error(&mut state, error).await;
    }

    /// Feed back a successful command on an acquired handle
    pub fn report_success(&self) {
        self.health.record_success();
    }

    /// Remaining block window, if any
    pub async fn blocked_for(&self) -> Option<Duration> {
        let state = self.state.lock().await;
        let now = Instant::now();
        state
            .blocked_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Tear down the shared handle
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if let Some(handle) = state.handle.take() {
            if let Err(e) = handle.disconnect().await {
                debug!(error = %e, "Ignoring error while disconnecting remote cache");
            }
            info!("Disconnected from remote cache");
        }
    }

    async fn connect_with_backoff(
        &self,
        connector: &dyn Connector,
    ) -> CacheResult<Arc<dyn RemoteConnection>> {
        let attempts = self.config.max_connect_attempts.max(1);
        let mut last_error = CacheError::Connection("no connect attempt made".to_string());

        for attempt in 1..=attempts {
            let result = tokio::time::timeout(self.config.connect_timeout, connector.connect())
                .await
                .unwrap_or(Err(CacheError::ConnectTimeout(self.config.connect_timeout)));

            match result {
                Ok(handle) => return Ok(handle),
                Err(e) if e.is_max_clients() => {
                    // Retrying only adds load to a server that is out of client slots.
                    return Err(e);
                }
                Err(e) => {
                    debug!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Remote cache connect attempt failed"
                    );
                    last_error = e;
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.backoff_for(attempt)).await;
            }
        }

        Err(last_error)
    }

    async fn apply_error(&self, state: &mut ConnectionState, error: &CacheError) {
        let disable = self.health.record_error(error);

        if error.is_max_clients() {
            let block = self.config.block_duration.saturating_mul(2);
            state.blocked_until = Some(Instant::now() + block);
            warn!(
                error = %error,
                block_secs = block.as_secs(),
                "Remote cache out of client slots, blocking connections"
            );
        } else if error.is_connection_level() {
            state.blocked_until = Some(Instant::now() + self.config.block_duration);
            warn!(
                error = %error,
                block_secs = self.config.block_duration.as_secs(),
                "Remote cache connection failed, blocking connections"
            );
        } else {
            debug!(error = %error, "Remote cache command error");
        }

        if disable {
            if let Some(handle) = state.handle.take() {
                if let Err(e) = handle.disconnect().await {
                    debug!(error = %e, "Ignoring error while disconnecting disabled handle");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let config = ConnectionConfig::default();
        assert!(config.backoff_for(1) >= Duration::from_millis(100));
        assert!(config.backoff_for(1) <= Duration::from_millis(110));
        assert_eq!(config.backoff_for(100), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_local_only_mode_never_connects() {
        let manager = ConnectionManager::new(
            None,
            Arc::new(HealthMonitor::default()),
            ConnectionConfig::default(),
        );
        assert!(!manager.has_remote());
        assert!(manager.get_client().await.is_none());
        assert!(manager.blocked_for().await.is_none());
    }
}
