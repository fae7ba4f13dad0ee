use std::path::PathBuf;

use live_core::{JsonDirStore, KeyValueStore, LiveConfig, MemoryStore};
use serde_json::json;

fn temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "{prefix}_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    dir
}

#[tokio::test]
async fn json_dir_store_round_trips_values() {
    let dir = temp_dir("gall_live_store");
    let store = JsonDirStore::open(&dir).await;

    assert_eq!(store.get("cache").await, None);
    store.set("cache", json!([1, 2, 3])).await.unwrap();

    // A fresh handle reads what the first one wrote.
    let reopened = JsonDirStore::open(&dir).await;
    assert_eq!(reopened.get("cache").await, Some(json!([1, 2, 3])));
    assert!(!dir.join("cache.json.tmp").exists());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn load_uses_tmp_fallback_on_corrupted_json() {
    let dir = temp_dir("gall_live_corrupt");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("config.json"), b"{ this is not json ")
        .await
        .unwrap();
    tokio::fs::write(dir.join("config.json.tmp"), br#"{"interval_ms": 2500}"#)
        .await
        .unwrap();

    let store = JsonDirStore::open(&dir).await;
    assert_eq!(store.get("config").await, Some(json!({ "interval_ms": 2500 })));

    let config = LiveConfig::load(&store).await;
    assert_eq!(config.interval_ms, 2500);
    assert_eq!(config.concurrency, LiveConfig::default().concurrency);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn corrupted_json_without_tmp_is_absent() {
    let dir = temp_dir("gall_live_absent");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("cache.json"), b"[[[").await.unwrap();

    let store = JsonDirStore::open(&dir).await;
    assert_eq!(store.get("cache").await, None);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn malformed_config_falls_back_to_defaults() {
    let store = MemoryStore::new();
    store
        .set("config", json!({ "concurrency": "lots" }))
        .await
        .unwrap();
    assert_eq!(LiveConfig::load(&store).await, LiveConfig::default());
}

#[tokio::test]
async fn config_is_saved_and_reloaded() {
    let store = MemoryStore::new();
    let config = LiveConfig {
        enabled: false,
        notification_rules: vec!["urgent".into()],
        ..LiveConfig::default()
    };
    config.save(&store).await.unwrap();
    assert_eq!(LiveConfig::load(&store).await, config);
}

#[test]
fn validate_rejects_zero_limits() {
    let config = LiveConfig {
        concurrency: 0,
        ..LiveConfig::default()
    };
    assert!(config.validate().is_err());

    let config = LiveConfig {
        limit_items: 0,
        ..LiveConfig::default()
    };
    assert!(config.validate().is_err());

    let mut config = LiveConfig::default();
    config.endpoints.list_url.clear();
    assert!(matches!(
        config.validate(),
        Err(live_core::ConfigError::Missing("endpoints.list_url"))
    ));

    assert!(LiveConfig::default().validate().is_ok());
}

#[tokio::test]
async fn set_recreates_a_removed_store_dir() {
    let dir = temp_dir("gall_live_recreate");
    let store = JsonDirStore::open(&dir).await;
    tokio::fs::remove_dir_all(&dir).await.unwrap();

    store.set("cache", json!([])).await.unwrap();
    assert!(dir.join("cache.json").exists());
    assert_eq!(store.get("cache").await, Some(json!([])));

    let _ = tokio::fs::remove_dir_all(&dir).await;
}
