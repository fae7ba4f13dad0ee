use std::sync::Arc;

use live_core::store::CACHE_KEY;
use live_core::{ContentCache, KeyValueStore, MemoryStore, SharedStore};
use serde_json::json;

async fn cache_with(max: usize) -> (ContentCache, MemoryStore) {
    let store = MemoryStore::new();
    let shared: SharedStore = Arc::new(store.clone());
    (ContentCache::load(shared, max).await, store)
}

#[tokio::test]
async fn evicts_oldest_entry_when_full() {
    let (cache, _) = cache_with(2).await;
    cache.set("g", 1, "x".into()).await;
    cache.set("g", 2, "y".into()).await;
    cache.set("g", 3, "z".into()).await;

    assert!(!cache.has("g", 1).await);
    assert!(cache.has("g", 2).await);
    assert!(cache.has("g", 3).await);
    assert_eq!(cache.len().await, 2);
}

#[tokio::test]
async fn overwrite_keeps_position_and_count() {
    let (cache, _) = cache_with(3).await;
    assert_eq!(cache.set("g", 1, "a".into()).await, 0);
    assert_eq!(cache.set("g", 2, "b".into()).await, 1);
    assert_eq!(cache.set("g", 1, "a2".into()).await, 0);
    assert_eq!(cache.len().await, 2);
    assert_eq!(cache.get("g", 1).await.as_deref(), Some("a2"));

    // Updating key 1 must not save it from being the next one evicted.
    cache.set("g", 3, "c".into()).await;
    cache.set("g", 4, "d".into()).await;
    assert!(!cache.has("g", 1).await);
    assert_eq!(
        cache.keys().await,
        vec![("g".to_owned(), 2), ("g".to_owned(), 3), ("g".to_owned(), 4)]
    );
}

#[tokio::test]
async fn reads_do_not_reorder_entries() {
    let (cache, _) = cache_with(2).await;
    cache.set("g", 1, "x".into()).await;
    cache.set("g", 2, "y".into()).await;
    assert_eq!(cache.get("g", 1).await.as_deref(), Some("x"));
    cache.set("g", 3, "z".into()).await;

    assert!(!cache.has("g", 1).await);
    assert!(cache.has("g", 2).await);
}

#[tokio::test]
async fn first_entry_is_reachable() {
    let (cache, _) = cache_with(4).await;
    cache.set("g", 7, "first".into()).await;
    assert!(cache.has("g", 7).await);
    assert_eq!(cache.get("g", 7).await.as_deref(), Some("first"));
}

#[tokio::test]
async fn keys_are_scoped_by_collection() {
    let (cache, _) = cache_with(4).await;
    cache.set("a", 1, "from a".into()).await;
    cache.set("b", 1, "from b".into()).await;
    assert_eq!(cache.len().await, 2);
    assert_eq!(cache.get("a", 1).await.as_deref(), Some("from a"));
    assert_eq!(cache.get("b", 1).await.as_deref(), Some("from b"));
    assert_eq!(cache.get("c", 1).await, None);
}

#[tokio::test]
async fn size_never_exceeds_limit() {
    let (cache, _) = cache_with(5).await;
    for item in 0..40u64 {
        // Every third write revisits an older key.
        let key = if item % 3 == 0 { item / 2 } else { item };
        cache.set("g", key, format!("p{item}")).await;
        assert!(cache.len().await <= 5);
    }
}

#[tokio::test]
async fn mutations_are_persisted_and_reloaded() {
    let (cache, store) = cache_with(3).await;
    cache.set("g", 1, "x".into()).await;
    cache.set("g", 2, "y".into()).await;

    let reloaded = ContentCache::load(Arc::new(store.clone()), 3).await;
    assert_eq!(reloaded.get("g", 2).await.as_deref(), Some("y"));
    assert_eq!(reloaded.len().await, 2);

    reloaded.reset().await;
    assert!(reloaded.is_empty().await);
    assert_eq!(store.get(CACHE_KEY).await, Some(json!([])));
}

#[tokio::test]
async fn malformed_stored_cache_loads_empty() {
    let store = MemoryStore::new();
    store
        .set(CACHE_KEY, json!({ "not": "a list" }))
        .await
        .unwrap();

    let cache = ContentCache::load(Arc::new(store), 3).await;
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn stored_cache_is_trimmed_to_limit() {
    let store = MemoryStore::new();
    store
        .set(
            CACHE_KEY,
            json!([
                { "collection": "g", "item": 1, "payload": "a" },
                { "collection": "g", "item": 2, "payload": "b" },
                { "collection": "g", "item": 3, "payload": "c" }
            ]),
        )
        .await
        .unwrap();

    let cache = ContentCache::load(Arc::new(store), 2).await;
    assert!(!cache.has("g", 1).await);
    assert!(cache.has("g", 3).await);
}
