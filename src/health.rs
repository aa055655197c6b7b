//! Health Monitor - Remote Cache Circuit Breaker
//!
//! Decides, on every cache operation, whether the remote service should be
//! attempted at all.
//!
//! # States
//!
//! ```text
//! Healthy ⇄ Unhealthy → Disabled → Healthy
//!            (max-clients    (threshold    (cooldown elapsed,
//!             errors seen)    reached)      retry allowed)
//! ```
//!
//! Only the max-clients signature counts toward the threshold. Unrelated
//! transient errors are recorded but never disable the remote cache.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::CacheError;

/// Configuration for [`HealthMonitor`]
#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    /// Max-clients errors needed to disable the remote cache
    pub error_threshold: u32,
    /// How long the remote cache stays disabled before a retry is allowed
    pub cooldown: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            error_threshold: 5,
            cooldown: Duration::from_secs(300),
        }
    }
}

/// Coarse state of the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Disabled,
}

/// Point-in-time copy of the breaker state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub is_healthy: bool,
    pub is_disabled: bool,
    pub error_counter: u32,
    /// Seconds since the last recorded success or error
    pub secs_since_last_check: u64,
}

#[derive(Debug)]
struct HealthState {
    is_healthy: bool,
    is_disabled: bool,
    last_check_time: Instant,
    error_counter: u32,
}

/// Circuit breaker over the remote cache's resource-exhaustion failure
///
/// Each instance owns its state, so independent caches (and tests) never
/// share a breaker.
#[derive(Debug)]
pub struct HealthMonitor {
    config: HealthConfig,
    state: Mutex<HealthState>,
}

impl HealthMonitor {
    /// Create a monitor in the `Healthy` state
    #[must_use]
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HealthState {
                is_healthy: true,
                is_disabled: false,
                last_check_time: Instant::now(),
                error_counter: 0,
            }),
        }
    }

    /// Record a successful remote interaction
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.is_healthy = true;
        state.error_counter = 0;
        state.last_check_time = Instant::now();
    }

    /// Record a failed remote interaction
    ///
    /// # Returns
    ///
    /// `true` when the error threshold is reached and the remote cache is now
    /// disabled; the caller should tear down its connection.
    pub fn record_error(&self, error: &CacheError) -> bool {
        let mut state = self.state.lock();
        state.last_check_time = Instant::now();

        if !error.is_max_clients() {
            return false;
        }

        state.error_counter += 1;
        state.is_healthy = false;

        if state.error_counter >= self.config.error_threshold {
            if !state.is_disabled {
                warn!(
                    errors = state.error_counter,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "Remote cache disabled after repeated max-clients errors"
                );
            }
            state.is_disabled = true;
            return true;
        }

        false
    }

    /// Record a failure given only its message text
    pub fn record_error_message(&self, message: &str) -> bool {
        self.record_error(&CacheError::from_message(message))
    }

    /// Whether the remote cache may be attempted right now
    ///
    /// A disabled breaker re-enables itself once the cooldown has elapsed
    /// since the last recorded check.
    pub fn should_use_redis(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_disabled {
            return true;
        }

        if state.last_check_time.elapsed() >= self.config.cooldown {
            state.is_disabled = false;
            state.error_counter = 0;
            info!("Remote cache cooldown elapsed, allowing a retry");
            return true;
        }

        false
    }

    /// Manual override for operational control
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.is_disabled = !enabled;
        if enabled {
            state.error_counter = 0;
        }
        state.last_check_time = Instant::now();
        info!(enabled, "Remote cache manually toggled");
    }

    /// Current coarse state
    pub fn status(&self) -> HealthStatus {
        let state = self.state.lock();
        Self::status_of(&state)
    }

    /// Copy of the full state for reporting
    pub fn snapshot(&self) -> HealthSnapshot {
        let state = self.state.lock();
        HealthSnapshot {
            status: Self::status_of(&state),
            is_healthy: state.is_healthy,
            is_disabled: state.is_disabled,
            error_counter: state.error_counter,
            secs_since_last_check: state.last_check_time.elapsed().as_secs(),
        }
    }

    fn status_of(state: &HealthState) -> HealthStatus {
        if state.is_disabled {
            HealthStatus::Disabled
        } else if state.is_healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
