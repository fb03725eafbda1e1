mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{BrokenTable, local_cache};
use geoproxy_cache::{
    CacheConfig, DistributedStore, ManualClock, MemoryTable, StoreSelection, SystemClock,
    TableStore, TieredCache,
};
use serde_json::json;

#[tokio::test]
async fn test_get_after_set_is_hit_for_any_positive_ttl() {
    let (cache, _) = local_cache("traffic");

    for (i, ttl_ms) in [1u64, 10, 1_000, 60_000, u64::MAX].into_iter().enumerate() {
        let key = format!("k{}", i);
        cache.set(&key, json!(i), Some(Duration::from_millis(ttl_ms))).await;
        assert_eq!(cache.get(&key).await, Some(json!(i)), "ttl {}ms", ttl_ms);
    }

    assert_eq!(cache.metrics().hits, 5);
    assert_eq!(cache.metrics().misses, 0);
}

#[tokio::test]
async fn test_expiry_with_real_time() {
    let cache = TieredCache::local("traffic", CacheConfig::default());

    cache.set("k", json!("v"), Some(Duration::from_millis(10))).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.get("k").await, None);
}

#[tokio::test]
async fn test_invalidation_then_fresh_set() {
    let (cache, _) = local_cache("traffic");

    cache.set("k", json!("v1"), Some(Duration::from_millis(60_000))).await;
    cache.invalidate("k");
    assert_eq!(cache.get("k").await, None);

    cache.set("k", json!("v2"), None).await;
    assert_eq!(cache.get("k").await, Some(json!("v2")));
}

#[tokio::test]
async fn test_invalidate_unknown_key_still_counts() {
    let (cache, _) = local_cache("traffic");

    cache.invalidate("never-set");

    assert_eq!(cache.metrics().invalidations, 1);
    assert_eq!(cache.get("never-set").await, None);
}

#[tokio::test]
async fn test_clear_empties_all_keys() {
    let (cache, _) = local_cache("traffic");
    let keys: Vec<String> = (0..50).map(|i| format!("key-{}", i)).collect();

    for key in &keys {
        cache.set(key, json!(key), None).await;
    }
    cache.clear().await;

    for key in &keys {
        assert_eq!(cache.get(key).await, None);
    }
    assert_eq!(cache.metrics().invalidations, 1);
}

#[tokio::test]
async fn test_hits_plus_misses_equals_gets() {
    let (cache, clock) = local_cache("traffic");
    let mut gets = 0u64;

    for i in 0..40u64 {
        let key = format!("k{}", i % 7);
        match i % 5 {
            0 => cache.set(&key, json!(i), Some(Duration::from_millis(5))).await,
            1 => cache.invalidate(&key),
            2 => clock.advance(Duration::from_millis(3)),
            3 if i % 2 == 0 => cache.clear().await,
            _ => {},
        }
        cache.get(&key).await;
        gets += 1;
    }

    let metrics = cache.metrics();
    assert_eq!(metrics.hits + metrics.misses, gets);
}

#[tokio::test]
async fn test_metrics_snapshot_has_no_side_effects() {
    let (cache, _) = local_cache("traffic");
    cache.set("k", json!(1), None).await;
    cache.get("k").await;

    let first = cache.metrics();
    let second = cache.metrics();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_capacity_bound_evicts_least_recently_used() {
    let clock = Arc::new(ManualClock::new());
    let config = CacheConfig {
        default_ttl: Duration::from_secs(60),
        max_entries: Some(3),
    };
    let cache = TieredCache::new("traffic", StoreSelection::local("test"), config, clock);

    for key in ["a", "b", "c"] {
        cache.set(key, json!(key), None).await;
    }
    cache.get("a").await;
    cache.set("d", json!("d"), None).await;

    assert_eq!(cache.entry_count(), Some(3));
    assert!(cache.get("b").await.is_none());
    assert!(cache.get("a").await.is_some());
    assert_eq!(cache.metrics_recorder().evictions(), 1);
}

#[tokio::test]
async fn test_table_round_trip_before_ttl() {
    let clock = Arc::new(ManualClock::new());
    let store = TableStore::new(Arc::new(MemoryTable::new()), "cache", "traffic", clock.clone());
    let cache = TieredCache::new(
        "traffic",
        StoreSelection::Distributed(Arc::new(store)),
        CacheConfig::default(),
        clock.clone(),
    );
    let value = json!({
        "provider": "tomtom",
        "congestion": 37,
        "speeds": {"current": 41.5, "freeFlow": 66.0},
        "tags": ["rush-hour", null, true]
    });

    cache.set("k", value.clone(), Some(Duration::from_secs(120))).await;
    clock.advance(Duration::from_secs(119));

    assert_eq!(cache.get("k").await, Some(value));
}

#[tokio::test]
async fn test_backend_errors_are_absorbed() {
    let broken = Arc::new(BrokenTable::default());
    let store = TableStore::new(broken.clone(), "cache", "traffic", Arc::new(SystemClock));
    let cache = TieredCache::new(
        "traffic",
        StoreSelection::Distributed(Arc::new(store)),
        CacheConfig::default(),
        Arc::new(SystemClock),
    );

    cache.set("k", json!(1), None).await;
    assert_eq!(cache.get("k").await, None);
    cache.set("k", json!(2), None).await;
    assert_eq!(cache.get("k").await, None);

    // Cada llamada llega al backend: un error no lo deshabilita
    assert_eq!(broken.calls(), 4);
    let metrics = cache.metrics();
    assert_eq!(metrics.sets, 2);
    assert_eq!(metrics.misses, 2);
}

#[tokio::test]
async fn test_try_methods_surface_errors() {
    let store = TableStore::new(
        Arc::new(BrokenTable::default()),
        "cache",
        "traffic",
        Arc::new(SystemClock),
    );

    assert!(store.try_get("k").await.is_err());
    assert!(store.try_set("k", &json!(1), Duration::from_secs(1)).await.is_err());
    assert_eq!(store.get("k").await, None);
}
