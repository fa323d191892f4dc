//! Live tests for RedisStore.
//!
//! These tests need a running Redis server and are `#[ignore]` by default.
//!
//! Run with: `REDIS_URL=redis://127.0.0.1:6379 cargo test --test redis_live_test -- --ignored`

use std::time::Duration;

use redis::AsyncCommands;
use uuid::Uuid;

use itinera::error::ErrorKind;
use itinera::limit::{RateWindow, WindowPolicy};
use itinera::store::{KeyValueStore, RedisStore};

fn redis_url() -> String {
    std::env::var("REDIS_URL").expect("REDIS_URL environment variable must be set for live tests")
}

async fn store() -> RedisStore {
    RedisStore::connect(&redis_url())
        .await
        .expect("should connect to Redis")
}

/// A key no other test run touches.
fn unique_key(prefix: &str) -> String {
    format!("itinera-test:{prefix}:{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_set_get_ttl_del() {
    let store = store().await;
    let key = unique_key("kv");

    store
        .set_ex(&key, "{\"a\":1}", Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("{\"a\":1}"));

    let ttl = store.ttl(&key).await.unwrap().expect("key should carry a TTL");
    assert!(ttl > Duration::from_secs(25) && ttl <= Duration::from_secs(30));

    assert!(store.del(&key).await.unwrap());
    assert!(!store.del(&key).await.unwrap());
    assert!(store.get(&key).await.unwrap().is_none());
    assert!(store.ttl(&key).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_set_ex_overwrites_value_and_ttl() {
    let store = store().await;
    let key = unique_key("overwrite");

    store.set_ex(&key, "old", Duration::from_secs(300)).await.unwrap();
    store.set_ex(&key, "new", Duration::from_secs(10)).await.unwrap();

    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("new"));
    assert!(store.ttl(&key).await.unwrap().unwrap() <= Duration::from_secs(10));
    store.del(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_incr_window_sets_ttl_on_first_hit() {
    let store = store().await;
    let key = unique_key("window");
    let window = Duration::from_secs(60);

    let first = store.incr_window(&key, window).await.unwrap();
    assert_eq!(first.count, 1);
    assert!(first.remaining > Duration::from_secs(55) && first.remaining <= window);

    let second = store.incr_window(&key, window).await.unwrap();
    assert_eq!(second.count, 2);
    assert!(second.remaining <= first.remaining);
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("2"));

    store.del(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_incr_window_repairs_counter_without_ttl() {
    let store = store().await;
    let key = unique_key("orphan");

    let client = redis::Client::open(redis_url()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    conn.set::<_, _, ()>(&key, 4).await.unwrap();
    assert!(store.ttl(&key).await.unwrap().is_none());

    let count = store.incr_window(&key, Duration::from_secs(60)).await.unwrap();
    assert_eq!(count.count, 5);
    assert_eq!(count.remaining, Duration::from_secs(60));
    assert!(store.ttl(&key).await.unwrap().is_some());

    store.del(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_window_rejects_eleventh_attempt() {
    let store = store().await;
    let email = format!("{}@example.com", Uuid::new_v4());
    let window = RateWindow::login(&email, WindowPolicy::new(60, 10));

    for n in 1..=10 {
        assert_eq!(window.admit(&store).await.unwrap().count, n);
    }
    let err = window.admit(&store).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    let retry_after = err.retry_after().unwrap();
    assert!(retry_after > Duration::ZERO && retry_after <= Duration::from_secs(60));
    assert_eq!(store.get(window.key()).await.unwrap().as_deref(), Some("11"));

    window.reset(&store).await.unwrap();
    assert!(store.get(window.key()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_concurrent_admissions_stop_at_the_limit() {
    let store = store().await;
    let email = format!("{}@example.com", Uuid::new_v4());
    let window = RateWindow::login(&email, WindowPolicy::new(60, 10));

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let store = store.clone();
            let window = window.clone();
            tokio::spawn(async move { window.admit(&store).await.is_ok() })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);

    window.reset(&store).await.unwrap();
}
