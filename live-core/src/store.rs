use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::StoreError;

/// Key under which the content cache is persisted.
pub const CACHE_KEY: &str = "cache";
/// Key under which [`crate::LiveConfig`] is persisted.
pub const CONFIG_KEY: &str = "config";

/// Durable key-value storage shared by the cache and the configuration.
///
/// `get` never fails: unreadable or malformed values are reported as absent.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.inner.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub async fn open(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!(error = %e, path = %dir.display(), "failed to create store dir");
        }
        Self { dir }
    }

    /// `$XDG_CONFIG_HOME/gall-live` or the current directory as a last resort.
    pub fn default_dir() -> PathBuf {
        let mut dir = dirs::config_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        dir.push("gall-live");
        dir
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

async fn read_json_with_tmp_fallback(path: &Path) -> Option<Value> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "failed to parse JSON, trying tmp fallback");
            let tmp = path.with_extension("json.tmp");
            let tmp_bytes = tokio::fs::read(&tmp).await.ok()?;
            serde_json::from_slice::<Value>(&tmp_bytes).ok()
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonDirStore {
    async fn get(&self, key: &str) -> Option<Value> {
        let value = read_json_with_tmp_fallback(&self.path_for(key)).await;
        if value.is_none() {
            debug!(key, "no stored value");
        }
        value
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let bytes = serde_json::to_vec_pretty(&value)?;
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                debug!(error = %e, path = %parent.display(), "failed to create store dir");
            }
        }
        // Ecriture atomique
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
