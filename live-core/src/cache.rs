use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::store::{SharedStore, CACHE_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub collection: String,
    pub item: u64,
    pub payload: String,
}

/// Bounded store of normalized detail content keyed by `(collection, item)`.
///
/// Eviction is FIFO by insertion order: overwriting an existing key keeps its
/// position, and reads never reorder entries. Every mutation is synchronized
/// to the backing [`crate::KeyValueStore`] while the write lock is held, so
/// the persisted snapshot always matches the latest in-memory state.
pub struct ContentCache {
    entries: RwLock<VecDeque<CacheEntry>>,
    max_entries: usize,
    store: SharedStore,
}

impl ContentCache {
    /// Loads the persisted entries. A missing or malformed stored value
    /// yields an empty cache.
    pub async fn load(store: SharedStore, max_entries: usize) -> Self {
        let mut entries = match store.get(CACHE_KEY).await {
            Some(value) => match serde_json::from_value::<VecDeque<CacheEntry>>(value) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(%err, "stored cache is malformed; starting empty");
                    VecDeque::new()
                }
            },
            None => VecDeque::new(),
        };
        while entries.len() > max_entries {
            entries.pop_front();
        }
        debug!(entries = entries.len(), max_entries, "content cache loaded");
        Self {
            entries: RwLock::new(entries),
            max_entries,
            store,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn has(&self, collection: &str, item: u64) -> bool {
        let entries = self.entries.read().await;
        position_of(&entries, collection, item).is_some()
    }

    pub async fn get(&self, collection: &str, item: u64) -> Option<String> {
        let entries = self.entries.read().await;
        position_of(&entries, collection, item).map(|idx| entries[idx].payload.clone())
    }

    /// Inserts or overwrites the payload and returns the entry's position
    /// after the operation.
    pub async fn set(&self, collection: &str, item: u64, payload: String) -> usize {
        let mut entries = self.entries.write().await;
        let position = match position_of(&entries, collection, item) {
            Some(idx) => {
                entries[idx].payload = payload;
                idx
            }
            None => {
                entries.push_back(CacheEntry {
                    collection: collection.to_owned(),
                    item,
                    payload,
                });
                if entries.len() > self.max_entries {
                    if let Some(evicted) = entries.pop_front() {
                        debug!(
                            collection = %evicted.collection,
                            item = evicted.item,
                            "evicted oldest cache entry"
                        );
                    }
                }
                entries.len().saturating_sub(1)
            }
        };
        self.sync(&entries).await;
        position
    }

    pub async fn reset(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.sync(&entries).await;
    }

    /// Snapshot of the keys in insertion order.
    pub async fn keys(&self) -> Vec<(String, u64)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| (e.collection.clone(), e.item))
            .collect()
    }

    async fn sync(&self, entries: &VecDeque<CacheEntry>) {
        let value = match serde_json::to_value(entries) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "failed to serialize content cache");
                return;
            }
        };
        if let Err(err) = self.store.set(CACHE_KEY, value).await {
            warn!(%err, "failed to persist content cache");
        }
    }
}

fn position_of(entries: &VecDeque<CacheEntry>, collection: &str, item: u64) -> Option<usize> {
    entries
        .iter()
        .position(|e| e.item == item && e.collection == collection)
}
