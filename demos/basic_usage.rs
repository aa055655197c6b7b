//! Basic Usage Example
//!
//! Demonstrates cache-aside reads, invalidation, and the admin stats.
//! Without `REDIS_URL` (or `REDIS_HOST`) set, the cache runs local-only.
//!
//! Run with: cargo run --example basic_usage

use resilient_cache::{CacheStrategy, CacheSystem};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Resilient Cache: Basic Usage ===\n");

    // 1. Initialize cache system from REDIS_* / CACHE_* variables
    let cache = CacheSystem::from_env()?;

    // 2. Health check: false only means the remote is unavailable
    if cache.health_check().await {
        println!("Remote cache reachable\n");
    } else {
        println!("Remote cache unavailable, serving from the local store\n");
    }

    // 3. Cache-aside read: computed once, then served from cache
    for round in 1..=2 {
        let details: serde_json::Value = cache
            .cache_manager()
            .get_or_set(
                "movie:27205:details",
                || async {
                    println!("  (fetching movie 27205 from upstream)");
                    Ok::<_, anyhow::Error>(serde_json::json!({
                        "id": 27205,
                        "title": "Inception",
                        "vote_average": 8.4
                    }))
                },
                Duration::from_secs(1800),
            )
            .await?;
        println!("Round {round}: {details}");
    }
    println!();

    // 4. Plain set/get with a TTL preset
    cache
        .cache_manager()
        .set_with_strategy("trending:day", &vec![27205, 550, 13], CacheStrategy::ShortTerm)
        .await?;
    let trending: Option<Vec<u64>> = cache.cache_manager().get("trending:day").await;
    println!("Trending: {trending:?}\n");

    // 5. Invalidate everything cached for the movie
    let deleted = cache.invalidator().invalidate_movie(27205).await;
    println!("Invalidated {deleted} keys for movie 27205");
    let after: Option<serde_json::Value> = cache.cache_manager().get("movie:27205:details").await;
    println!("After invalidation: {after:?}\n");

    // 6. Statistics
    let server = cache.cache_manager().server_stats().await;
    println!("Server stats: {}", serde_json::to_string_pretty(&server)?);

    let stats = cache.cache_manager().get_stats();
    println!("\n=== Cache Statistics ===");
    println!("Total requests: {}", stats.total_requests);
    println!("Remote hits: {}", stats.remote_hits);
    println!("Local hits: {}", stats.local_hits);
    println!("Misses: {}", stats.misses);
    println!("Hit rate: {:.2}%", stats.hit_rate);
    println!("Remote errors: {}", stats.remote_errors);

    cache.shutdown().await;
    Ok(())
}
