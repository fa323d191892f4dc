//! Response cache tests against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use itinera::cache::{CacheConfig, CacheKey, ResponseCache};
use itinera::store::{KeyValueStore, MemoryStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Extraction {
    origin: String,
    days: u32,
}

fn sample() -> Extraction {
    Extraction {
        origin: "Dhaka".to_string(),
        days: 3,
    }
}

fn cache() -> (Arc<MemoryStore>, ResponseCache) {
    let store = Arc::new(MemoryStore::new());
    let cache = ResponseCache::new(store.clone(), CacheConfig::default());
    (store, cache)
}

#[tokio::test]
async fn miss_then_hit() {
    let (_, cache) = cache();
    let key = CacheKey::search_field("Dhaka for 3 days");

    assert_eq!(cache.get::<Extraction>(&key).await.unwrap(), None);
    cache.put_default(&key, &sample()).await.unwrap();
    assert_eq!(cache.get::<Extraction>(&key).await.unwrap(), Some(sample()));
}

#[tokio::test]
async fn entries_are_stored_as_json_under_the_display_key() {
    let (store, cache) = cache();
    let key = CacheKey::search_field("Dhaka for 3 days");
    cache.put_default(&key, &sample()).await.unwrap();

    let raw = store.get(&key.to_string()).await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json, serde_json::json!({"origin": "Dhaka", "days": 3}));
}

#[tokio::test(start_paused = true)]
async fn entries_expire_after_a_day() {
    let (store, cache) = cache();
    let key = CacheKey::search_field("Dhaka for 3 days");
    cache.put_default(&key, &sample()).await.unwrap();
    assert_eq!(
        store.ttl(&key.to_string()).await.unwrap(),
        Some(Duration::from_secs(86_400))
    );

    tokio::time::advance(Duration::from_secs(86_399)).await;
    assert!(cache.get::<Extraction>(&key).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(cache.get::<Extraction>(&key).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn configured_ttl_is_used() {
    let store = Arc::new(MemoryStore::new());
    let cache = ResponseCache::new(
        store.clone(),
        CacheConfig::new().ttl(Duration::from_secs(120)),
    );
    assert_eq!(cache.ttl(), Duration::from_secs(120));

    let key = CacheKey::search_field("short lived");
    cache.put_default(&key, &sample()).await.unwrap();
    tokio::time::advance(Duration::from_secs(120)).await;
    assert!(cache.get::<Extraction>(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn undecodable_entry_is_a_miss_and_gets_overwritten() {
    let (store, cache) = cache();
    let key = CacheKey::search_field("old schema");
    store
        .set_ex(&key.to_string(), r#"{"legacy": true}"#, Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(cache.get::<Extraction>(&key).await.unwrap(), None);

    cache.put_default(&key, &sample()).await.unwrap();
    assert_eq!(cache.get::<Extraction>(&key).await.unwrap(), Some(sample()));
}
