//! Benchmarks for basic cache operations
//!
//! This benchmark suite measures the performance of:
//! - Local store read/write operations
//! - Façade hit vs miss latency with the remote unavailable
//! - `get_or_set` on a warm key
//! - Different data sizes

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use resilient_cache::{CacheStrategy, CacheSystem, LocalStore};
use serde_json::json;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Setup a local-only cache system for benchmarks
fn setup_cache() -> (CacheSystem, Runtime) {
    let rt = Runtime::new().unwrap_or_else(|_| panic!("Failed to create runtime"));
    let cache = rt.block_on(async {
        CacheSystem::local_only().unwrap_or_else(|_| panic!("Failed to create cache system"))
    });
    (cache, rt)
}

/// Generate test data of specified size
fn test_data(size_bytes: usize) -> serde_json::Value {
    let data_string = "x".repeat(size_bytes);
    json!({
        "data": data_string,
        "size": size_bytes,
        "timestamp": "2025-01-01T00:00:00Z"
    })
}

/// Benchmark façade writes
fn bench_cache_set(c: &mut Criterion) {
    let (cache, rt) = setup_cache();

    let mut group = c.benchmark_group("cache_set");
    group.measurement_time(Duration::from_secs(10));

    for size in &[100, 1024, 10240, 102_400] {
        let data = test_data(*size);

        group.bench_with_input(BenchmarkId::new("short_term", size), size, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let key = format!("bench:set:{}", rand::random::<u32>());
                    cache
                        .cache_manager()
                        .set_with_strategy(&key, black_box(&data), CacheStrategy::ShortTerm)
                        .await
                        .unwrap_or_else(|_| panic!("Failed to set cache"));
                });
            });
        });
    }

    group.finish();
}

/// Benchmark façade hits served from the local store
fn bench_cache_hit(c: &mut Criterion) {
    let (cache, rt) = setup_cache();
    let data = test_data(1024);
    rt.block_on(async {
        cache
            .cache_manager()
            .set("bench:hit", &data)
            .await
            .unwrap_or_else(|_| panic!("Failed to set cache"));
    });

    c.bench_function("cache_hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let value: Option<serde_json::Value> =
                    cache.cache_manager().get(black_box("bench:hit")).await;
                black_box(value)
            })
        });
    });
}

/// Benchmark misses in both tiers
fn bench_cache_miss(c: &mut Criterion) {
    let (cache, rt) = setup_cache();

    c.bench_function("cache_miss", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("bench:miss:{}", rand::random::<u32>());
                let value: Option<serde_json::Value> = cache.cache_manager().get(&key).await;
                black_box(value)
            })
        });
    });
}

/// Benchmark `get_or_set` on a key that is already cached
fn bench_get_or_set_warm(c: &mut Criterion) {
    let (cache, rt) = setup_cache();

    c.bench_function("get_or_set_warm", |b| {
        b.iter(|| {
            rt.block_on(async {
                let value: serde_json::Value = cache
                    .cache_manager()
                    .get_or_set(
                        "bench:warm",
                        || async { Ok::<_, anyhow::Error>(test_data(256)) },
                        Duration::from_secs(300),
                    )
                    .await
                    .unwrap_or_else(|_| panic!("Compute failed"));
                black_box(value)
            })
        });
    });
}

/// Benchmark the raw local store without the façade
fn bench_local_store(c: &mut Criterion) {
    let store = LocalStore::new();
    let payload = test_data(1024).to_string();
    store.set("bench:local", payload.clone(), Duration::from_secs(300));

    let mut group = c.benchmark_group("local_store");
    group.bench_function("get_raw", |b| {
        b.iter(|| black_box(store.get_raw(black_box("bench:local"))));
    });
    group.bench_function("set", |b| {
        b.iter(|| {
            let key = format!("bench:local:{}", rand::random::<u16>());
            store.set(&key, payload.clone(), Duration::from_secs(300));
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_cache_set,
    bench_cache_hit,
    bench_cache_miss,
    bench_get_or_set_warm,
    bench_local_store
);
criterion_main!(benches);
