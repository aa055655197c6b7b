//! Cache Backend Implementations
//!
//! # Available Backends
//!
//! - **`LocalStore`** - In-process expiring `DashMap`, the always-on fallback tier
//! - **Redis** - Remote cache behind the [`Connector`](crate::traits::Connector) seam
//!   (feature: `redis`)
//!
//! # Usage
//!
//! ```rust,no_run
//! use resilient_cache::backends::{LocalStore, RedisConnector};
//!
//! # fn example() -> anyhow::Result<()> {
//! let local = LocalStore::new();
//! let redis = RedisConnector::new("redis://127.0.0.1:6379")?;
//! # Ok(())
//! # }
//! ```

pub mod local_store;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use local_store::{LocalStore, LocalStoreStats};

#[cfg(feature = "redis")]
pub use redis_cache::{RedisConnection, RedisConnector};
