//! Cache invalidation helpers
//!
//! Translates domain events ("movie 27205 changed", "home page changed") into
//! coordinated sets of façade deletes. Keys follow the
//! `<entity>:<id>:<aspect>` convention used by the content-API proxies.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::cache_manager::CacheManager;

/// Per-entity aspects cached by the detail routes
pub const ENTITY_ASPECTS: [&str; 3] = ["details", "recommendations", "similar"];

/// Keys backing the aggregated home page
pub const HOME_KEYS: [&str; 5] = [
    "home:aggregate",
    "home:trending",
    "home:popular_movies",
    "home:popular_tv",
    "home:top_rated",
];

/// Content entity kinds with per-id cache keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Movie,
    Tv,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => f.write_str("movie"),
            Self::Tv => f.write_str("tv"),
        }
    }
}

/// Build a cache key, e.g. `movie:27205:details`
#[must_use]
pub fn entity_key(kind: EntityKind, id: u64, aspect: &str) -> String {
    format!("{kind}:{id}:{aspect}")
}

/// Every aspect key of one entity
#[must_use]
pub fn entity_keys(kind: EntityKind, id: u64) -> Vec<String> {
    ENTITY_ASPECTS
        .iter()
        .map(|aspect| entity_key(kind, id, aspect))
        .collect()
}

/// What to invalidate
///
/// Tagged for JSON so an admin endpoint can accept it as a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvalidationTarget {
    /// All cached aspects of a movie
    Movie { id: u64 },
    /// All cached aspects of a TV show
    Tv { id: u64 },
    /// The aggregated home-page keys
    Home,
    /// Explicit keys
    Keys { keys: Vec<String> },
    /// Keys matching a glob pattern (e.g. `"movie:*"`)
    Pattern { pattern: String },
}

impl InvalidationTarget {
    /// Keys this target resolves to without consulting the cache
    ///
    /// `None` for [`Pattern`](Self::Pattern), which needs a key scan.
    #[must_use]
    pub fn fixed_keys(&self) -> Option<Vec<String>> {
        match self {
            Self::Movie { id } => Some(entity_keys(EntityKind::Movie, *id)),
            Self::Tv { id } => Some(entity_keys(EntityKind::Tv, *id)),
            Self::Home => Some(HOME_KEYS.iter().map(|k| (*k).to_string()).collect()),
            Self::Keys { keys } => Some(keys.clone()),
            Self::Pattern { .. } => None,
        }
    }
}

/// Issues coordinated deletes against a shared [`CacheManager`]
#[derive(Clone)]
pub struct Invalidator {
    cache: Arc<CacheManager>,
}

impl Invalidator {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }

    /// Drop every cached aspect of a movie
    pub async fn invalidate_movie(&self, id: u64) -> usize {
        self.invalidate(&InvalidationTarget::Movie { id }).await
    }

    /// Drop every cached aspect of a TV show
    pub async fn invalidate_tv(&self, id: u64) -> usize {
        self.invalidate(&InvalidationTarget::Tv { id }).await
    }

    /// Drop the aggregated home-page keys
    pub async fn invalidate_home(&self) -> usize {
        self.invalidate(&InvalidationTarget::Home).await
    }

    /// Invalidate a target, returning how many keys were deleted
    ///
    /// Deletes run concurrently. A delete cannot fail from the caller's side,
    /// so there is nothing to aggregate.
    pub async fn invalidate(&self, target: &InvalidationTarget) -> usize {
        let count = match target {
            InvalidationTarget::Pattern { pattern } => self.cache.delete_matching(pattern).await,
            InvalidationTarget::Movie { .. }
            | InvalidationTarget::Tv { .. }
            | InvalidationTarget::Home
            | InvalidationTarget::Keys { .. } => {
                let keys = target.fixed_keys().unwrap_or_default();
                join_all(keys.iter().map(|key| self.cache.delete(key))).await;
                keys.len()
            }
        };

        info!(invalidation = ?target, count, "Cache invalidated");
        count
    }
}
