//! Benchmarks for cache key derivation and result cache lookups.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::time::Duration;
use stepflow::cache::{cache_key, ResultCache};
use stepflow::core::Outcome;

fn params() -> serde_json::Value {
    json!({
        "params": {"style": "unit", "targets": ["src/lib.rs", "src/engine/mod.rs"]},
        "context": {"project_path": "/srv/app", "language": "rust"},
    })
}

fn cache_key_benchmark(c: &mut Criterion) {
    let params = params();
    c.bench_function("cache_key", |b| {
        b.iter(|| cache_key(black_box("generate"), black_box(&params)));
    });
}

fn result_cache_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let _guard = runtime.enter();

    let cache = ResultCache::new();
    let params = params();
    cache.set(
        "generate",
        &params,
        Outcome::ok(json!({"tests": 12})),
        Duration::from_secs(3600),
    );

    c.bench_function("result_cache_hit", |b| {
        b.iter(|| cache.get(black_box("generate"), black_box(&params)));
    });

    let missing = json!({"params": {"style": "property"}});
    c.bench_function("result_cache_miss", |b| {
        b.iter(|| cache.get(black_box("generate"), black_box(&missing)));
    });

    c.bench_function("result_cache_set", |b| {
        b.iter(|| {
            cache.set(
                "analyze",
                black_box(&params),
                Outcome::ok_empty(),
                Duration::from_secs(60),
            );
        });
    });
}

criterion_group!(benches, cache_key_benchmark, result_cache_benchmark);
criterion_main!(benches);
