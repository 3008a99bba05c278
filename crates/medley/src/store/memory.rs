//! # Memory Backend
//!
//! Non-persistent backend holding every named store in process memory. This
//! is the backend the test suites run against, and what the gateway falls
//! back to when configured without a storage root.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::backend::StoreBackend;
use super::types::{EntryKey, EntryMeta, StoreResult, StoredResponse};

#[derive(Default)]
struct StoreMap {
    entries: HashMap<EntryKey, StoredResponse>,
    /// Insertion order, oldest first. The only ordering signal eviction gets.
    order: Vec<EntryKey>,
}

/// In-memory store backend.
#[derive(Default)]
pub struct MemoryBackend {
    stores: RwLock<HashMap<String, StoreMap>>,
    sequence: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn keys(&self, store: &str) -> StoreResult<Vec<EntryKey>> {
        let stores = self.stores.read();
        Ok(stores
            .get(store)
            .map(|map| map.order.clone())
            .unwrap_or_default())
    }

    async fn get(&self, store: &str, key: &EntryKey) -> StoreResult<Option<StoredResponse>> {
        let stores = self.stores.read();
        Ok(stores
            .get(store)
            .and_then(|map| map.entries.get(key).cloned()))
    }

    async fn meta(&self, store: &str, key: &EntryKey) -> StoreResult<Option<EntryMeta>> {
        let stores = self.stores.read();
        Ok(stores
            .get(store)
            .and_then(|map| map.entries.get(key).map(|entry| entry.meta.clone())))
    }

    async fn put(&self, store: &str, key: EntryKey, mut response: StoredResponse) -> StoreResult<()> {
        response.meta.sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let mut stores = self.stores.write();
        let map = stores.entry(store.to_string()).or_default();
        if map.entries.insert(key.clone(), response).is_some() {
            map.order.retain(|existing| existing != &key);
        }
        map.order.push(key);
        Ok(())
    }

    async fn delete(&self, store: &str, key: &EntryKey) -> StoreResult<bool> {
        let mut stores = self.stores.write();
        let Some(map) = stores.get_mut(store) else {
            return Ok(false);
        };
        let removed = map.entries.remove(key).is_some();
        if removed {
            map.order.retain(|existing| existing != key);
        }
        Ok(removed)
    }
}
