//! RedisStore contra un servidor real.
//!
//! Ignorados por defecto. Para correrlos:
//! `REDIS_URL=redis://127.0.0.1:6379 cargo test -p geoproxy-cache -- --ignored`
#![cfg(feature = "redis-store")]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use geoproxy_cache::{DistributedStore, RedisStore};
use serde_json::json;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string())
}

/// Namespace unico por test y por corrida.
fn unique_namespace(label: &str) -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    format!("geoproxy-test-{}-{}-{}", label, std::process::id(), nanos)
}

async fn raw_connection() -> redis::aio::MultiplexedConnection {
    redis::Client::open(redis_url())
        .unwrap()
        .get_multiplexed_async_connection()
        .await
        .unwrap()
}

async fn connect(namespace: &str) -> RedisStore {
    RedisStore::connect(&redis_url(), namespace).await.unwrap()
}

#[tokio::test]
#[ignore = "requires a Redis server (REDIS_URL)"]
async fn test_set_then_get_returns_equal_value() {
    let ns = unique_namespace("roundtrip");
    let store = connect(&ns).await;
    let value = json!({
        "provider": "tomtom",
        "congestion": 42,
        "segments": [{"id": 1, "speed": 31.5}, {"id": 2, "speed": null}],
        "live": true
    });

    store.try_set("k", &value, Duration::from_secs(60)).await.unwrap();

    assert_eq!(store.try_get("k").await.unwrap(), Some(value));
    assert_eq!(store.try_get("missing").await.unwrap(), None);

    store.try_clear().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a Redis server (REDIS_URL)"]
async fn test_set_applies_px_expiry() {
    let ns = unique_namespace("expiry");
    let store = connect(&ns).await;
    let mut raw = raw_connection().await;

    store.try_set("k", &json!(1), Duration::from_secs(60)).await.unwrap();
    let pttl: i64 = redis::cmd("PTTL")
        .arg(format!("{}:k", ns))
        .query_async(&mut raw)
        .await
        .unwrap();
    assert!(pttl > 0 && pttl <= 60_000, "PTTL was {}", pttl);

    // Menos de 1ms se redondea a 1ms, no a un borrado
    store.try_set("short", &json!(2), Duration::from_micros(500)).await.unwrap();
    let pttl: i64 = redis::cmd("PTTL")
        .arg(format!("{}:short", ns))
        .query_async(&mut raw)
        .await
        .unwrap();
    // -2: ya expiro; nunca -1 (sin expiry)
    assert!(pttl == -2 || (0..=1).contains(&pttl), "PTTL was {}", pttl);

    store.try_set("brief", &json!(3), Duration::from_millis(50)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.try_get("brief").await.unwrap(), None);

    store.try_clear().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a Redis server (REDIS_URL)"]
async fn test_zero_ttl_deletes_existing_key() {
    let ns = unique_namespace("zero-ttl");
    let store = connect(&ns).await;
    let mut raw = raw_connection().await;

    store.try_set("k", &json!("old"), Duration::from_secs(60)).await.unwrap();
    store.try_set("k", &json!("new"), Duration::ZERO).await.unwrap();

    let exists: i64 = redis::cmd("EXISTS")
        .arg(format!("{}:k", ns))
        .query_async(&mut raw)
        .await
        .unwrap();
    assert_eq!(exists, 0);
    assert_eq!(store.try_get("k").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a Redis server (REDIS_URL)"]
async fn test_clear_only_touches_own_namespace() {
    let ns_a = unique_namespace("clear-a");
    let ns_b = unique_namespace("clear-b");
    let store_a = connect(&ns_a).await;
    let store_b = connect(&ns_b).await;

    for i in 0..5 {
        let key = format!("k{}", i);
        store_a.try_set(&key, &json!(i), Duration::from_secs(60)).await.unwrap();
        store_b.try_set(&key, &json!(i), Duration::from_secs(60)).await.unwrap();
    }

    store_a.try_clear().await.unwrap();

    for i in 0..5 {
        let key = format!("k{}", i);
        assert_eq!(store_a.try_get(&key).await.unwrap(), None);
        assert_eq!(store_b.try_get(&key).await.unwrap(), Some(json!(i)));
    }

    store_b.try_clear().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a Redis server (REDIS_URL)"]
async fn test_clear_with_glob_namespace_spares_others() {
    let base = unique_namespace("glob");
    let wild = RedisStore::connect(&redis_url(), &format!("{}*", base)).await.unwrap();
    let other = RedisStore::connect(&redis_url(), &format!("{}-other", base)).await.unwrap();

    wild.try_set("k", &json!("wild"), Duration::from_secs(60)).await.unwrap();
    other.try_set("k", &json!("other"), Duration::from_secs(60)).await.unwrap();

    wild.try_clear().await.unwrap();

    assert_eq!(wild.try_get("k").await.unwrap(), None);
    assert_eq!(other.try_get("k").await.unwrap(), Some(json!("other")));

    other.try_clear().await.unwrap();
}
