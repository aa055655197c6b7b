//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - A scripted in-memory remote standing in for Redis
//! - A connector whose connect outcome can be switched mid-test
//! - An observer that records events
//! - Cache system constructors for online/offline scenarios

#![allow(dead_code)]

use parking_lot::Mutex;
use resilient_cache::{
    CacheConfig, CacheError, CacheEvent, CacheObserver, CacheResult, CacheSystem,
    CacheSystemBuilder, ConnectionConfig, Connector, RemoteConnection, RemoteServerInfo,
    async_trait,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

pub const MAX_CLIENTS_REPLY: &str = "ERR max number of clients reached";

/// In-memory remote keyspace
#[derive(Default)]
pub struct FakeRemote {
    entries: Mutex<HashMap<String, String>>,
    deleted: Mutex<Vec<String>>,
    failure: Mutex<Option<CacheError>>,
    closed: AtomicBool,
    pub disconnects: AtomicU32,
}

impl FakeRemote {
    /// Make every subsequent command fail with a connection error
    pub fn fail_commands(&self, failing: bool) {
        *self.failure.lock() =
            failing.then(|| CacheError::Connection("Broken pipe (os error 32)".to_string()));
    }

    /// Make every subsequent command fail with `error`
    pub fn fail_commands_with(&self, error: CacheError) {
        *self.failure.lock() = Some(error);
    }

    /// Make the handle report itself closed
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Keys passed to `del`, sorted
    pub fn deleted_keys(&self) -> Vec<String> {
        let mut keys = self.deleted.lock().clone();
        keys.sort();
        keys
    }

    fn check(&self) -> CacheResult<()> {
        match self.failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn pattern_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl RemoteConnection for FakeRemote {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl: Duration) -> CacheResult<()> {
        self.check()?;
        self.put_raw(key, value);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<usize> {
        self.check()?;
        let mut entries = self.entries.lock();
        self.deleted.lock().extend(keys.iter().cloned());
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.check()?;
        self.entries.lock().clear();
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.check()?;
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .keys()
            .filter(|k| pattern_matches(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn server_info(&self) -> CacheResult<RemoteServerInfo> {
        self.check()?;
        Ok(RemoteServerInfo {
            key_count: self.entries.lock().len() as u64,
            used_memory_bytes: 2_097_152,
            used_memory_human: "2.00M".to_string(),
            uptime_secs: 86_400,
            keyspace_hits: 90,
            keyspace_misses: 10,
        })
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check()
    }

    async fn disconnect(&self) -> CacheResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "FakeRemote"
    }
}

/// How the next connect attempt behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    Accept,
    Refuse,
    MaxClients,
    Hang,
}

/// Connector handing out a shared [`FakeRemote`]
pub struct FakeConnector {
    pub remote: Arc<FakeRemote>,
    mode: Mutex<ConnectMode>,
    delay: Duration,
    pub connects: AtomicU32,
}

impl FakeConnector {
    pub fn new(mode: ConnectMode) -> Arc<Self> {
        Self::with_delay(mode, Duration::ZERO)
    }

    pub fn with_delay(mode: ConnectMode, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            remote: Arc::new(FakeRemote::default()),
            mode: Mutex::new(mode),
            delay,
            connects: AtomicU32::new(0),
        })
    }

    pub fn set_mode(&self, mode: ConnectMode) {
        *self.mode.lock() = mode;
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> CacheResult<Arc<dyn RemoteConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mode = *self.mode.lock();
        match mode {
            ConnectMode::Accept => {
                self.remote.closed.store(false, Ordering::SeqCst);
                Ok(Arc::clone(&self.remote) as Arc<dyn RemoteConnection>)
            }
            ConnectMode::Refuse => Err(CacheError::Connection(
                "Connection refused (os error 111)".to_string(),
            )),
            ConnectMode::MaxClients => Err(CacheError::from_message(MAX_CLIENTS_REPLY)),
            ConnectMode::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &'static str {
        "FakeConnector"
    }
}

/// Observer collecting event names
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.as_str() == name).count()
    }
}

impl CacheObserver for RecordingObserver {
    fn on_event(&self, event: &CacheEvent<'_>) {
        let name = match event {
            CacheEvent::RemoteHit { .. } => "remote_hit",
            CacheEvent::LocalHit { .. } => "local_hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Stored { .. } => "stored",
            CacheEvent::CorruptEntry { .. } => "corrupt",
            CacheEvent::RemoteFailure { .. } => "remote_failure",
            CacheEvent::Coalesced { .. } => "coalesced",
        };
        self.events.lock().push(name.to_string());
    }
}

/// Short timeouts, a single connect attempt, and the default 30s block
pub fn fast_config() -> CacheConfig {
    CacheConfig {
        connection: ConnectionConfig {
            connect_timeout: Duration::from_millis(200),
            max_connect_attempts: 1,
            ..ConnectionConfig::default()
        },
        ..CacheConfig::default()
    }
}

/// Build a cache around `connector`
pub fn cache_with(connector: Arc<FakeConnector>, config: CacheConfig) -> CacheSystem {
    CacheSystemBuilder::new()
        .with_config(config)
        .with_connector(connector)
        .build()
        .unwrap_or_else(|e| panic!("Failed to build cache system: {e}"))
}

/// Build a cache around `connector` that reports to `observer`
pub fn observed_cache(
    connector: Arc<FakeConnector>,
    observer: Arc<RecordingObserver>,
) -> CacheSystem {
    CacheSystemBuilder::new()
        .with_config(fast_config())
        .with_connector(connector)
        .with_observer(observer)
        .build()
        .unwrap_or_else(|e| panic!("Failed to build cache system: {e}"))
}

/// Cache whose remote refuses every connection
pub fn offline_cache() -> (CacheSystem, Arc<FakeConnector>) {
    let connector = FakeConnector::new(ConnectMode::Refuse);
    (cache_with(Arc::clone(&connector), fast_config()), connector)
}

/// Cache backed by a working in-memory remote
pub fn online_cache() -> (CacheSystem, Arc<FakeConnector>) {
    let connector = FakeConnector::new(ConnectMode::Accept);
    (cache_with(Arc::clone(&connector), fast_config()), connector)
}

/// Generate test data
pub mod test_data {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Movie {
        pub id: u64,
        pub title: String,
        pub vote_average: f64,
    }

    impl Movie {
        pub fn new(id: u64, title: &str) -> Self {
            Self {
                id,
                title: title.to_string(),
                vote_average: 8.4,
            }
        }
    }

    pub fn json_movie(id: u64, title: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": title,
            "genres": ["Drama"],
        })
    }
}
