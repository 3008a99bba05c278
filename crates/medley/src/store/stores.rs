//! # Store Registry
//!
//! Opens named stores over a shared backend. The registry is handed out by
//! value; clones are cheap and observe the same entries.

use std::path::Path;
use std::sync::Arc;

use super::backend::StoreBackend;
use super::disk::DiskBackend;
use super::memory::MemoryBackend;
use super::types::{EntryKey, EntryMeta, StoreResult, StoredResponse};

/// Registry of named stores sharing one backend.
#[derive(Clone)]
pub struct Stores {
    backend: Arc<dyn StoreBackend>,
}

impl Stores {
    /// Registry over an explicit backend.
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Registry over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Registry over a disk backend rooted at `root`, probed once here.
    ///
    /// An error is the session-wide signal that storage is unusable; the
    /// caller records the outcome and never probes again.
    pub async fn on_disk(root: impl AsRef<Path>) -> StoreResult<Self> {
        let backend = DiskBackend::probe(root.as_ref()).await?;
        Ok(Self::new(Arc::new(backend)))
    }

    /// Open a named store. Opening is idempotent: every handle opened under
    /// the same name observes the same entries.
    pub fn open(&self, name: impl Into<String>) -> CacheStore {
        CacheStore {
            name: Arc::from(name.into()),
            backend: self.backend.clone(),
        }
    }
}

/// Handle to one named store.
#[derive(Clone)]
pub struct CacheStore {
    name: Arc<str>,
    backend: Arc<dyn StoreBackend>,
}

impl CacheStore {
    /// Name this store was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keys in insertion order, oldest first.
    pub async fn keys(&self) -> StoreResult<Vec<EntryKey>> {
        self.backend.keys(&self.name).await
    }

    /// Look up one entry.
    pub async fn get(&self, key: &EntryKey) -> StoreResult<Option<StoredResponse>> {
        self.backend.get(&self.name, key).await
    }

    /// Metadata-only lookup.
    pub async fn meta(&self, key: &EntryKey) -> StoreResult<Option<EntryMeta>> {
        self.backend.meta(&self.name, key).await
    }

    /// Insert or replace an entry.
    pub async fn put(&self, key: EntryKey, response: StoredResponse) -> StoreResult<()> {
        self.backend.put(&self.name, key, response).await
    }

    /// Remove an entry. Returns `false` if the key was absent.
    pub async fn delete(&self, key: &EntryKey) -> StoreResult<bool> {
        self.backend.delete(&self.name, key).await
    }

    /// Relaxed lookup matching on URL alone, disregarding method and any
    /// request-header variance recorded at store time. Used as the last
    /// resort when the network and the exact-key lookup both came up empty.
    pub async fn match_url(&self, url: &str) -> StoreResult<Option<StoredResponse>> {
        for key in self.keys().await? {
            if key.url == url {
                if let Some(found) = self.get(&key).await? {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    /// Number of entries currently stored.
    pub async fn count(&self) -> StoreResult<usize> {
        Ok(self.keys().await?.len())
    }

    /// Total payload bytes, summed from per-entry metadata.
    pub async fn total_size(&self) -> StoreResult<u64> {
        let mut total = 0;
        for key in self.keys().await? {
            if let Some(meta) = self.meta(&key).await? {
                total += meta.size;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn response(body: &str) -> StoredResponse {
        StoredResponse::new(200, Some("text/plain".to_string()), Bytes::from(body.to_string()))
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let stores = Stores::in_memory();
        let first = stores.open("app-cache-v1");
        let second = stores.open("app-cache-v1");

        first
            .put(EntryKey::get("https://example.com/a"), response("shared"))
            .await
            .unwrap();

        let found = second
            .get(&EntryKey::get("https://example.com/a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.body, Bytes::from("shared"));
        assert_eq!(second.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_match_url_ignores_method() {
        let stores = Stores::in_memory();
        let store = stores.open("app-cache-v1");

        store
            .put(
                EntryKey::new("HEAD", "https://example.com/page"),
                response("page"),
            )
            .await
            .unwrap();

        assert!(store
            .get(&EntryKey::get("https://example.com/page"))
            .await
            .unwrap()
            .is_none());

        let relaxed = store
            .match_url("https://example.com/page")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(relaxed.body, Bytes::from("page"));
    }

    #[tokio::test]
    async fn test_match_url_misses_cleanly() {
        let stores = Stores::in_memory();
        let store = stores.open("app-cache-v1");
        assert!(store.match_url("https://example.com/nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_total_size_sums_metadata() {
        let stores = Stores::in_memory();
        let store = stores.open("video-cache-v1");

        store
            .put(EntryKey::get("https://example.com/a"), response("aaaa"))
            .await
            .unwrap();
        store
            .put(EntryKey::get("https://example.com/b"), response("bb"))
            .await
            .unwrap();

        assert_eq!(store.total_size().await.unwrap(), 6);
    }
}
