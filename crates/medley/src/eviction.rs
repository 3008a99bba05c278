//! # Eviction Policy
//!
//! Bounds the video store by entry count and total payload size. Eviction is
//! strictly FIFO: insertion order is the only ordering signal the stores
//! keep, so the oldest entry always goes first.

use tracing::debug;

use crate::store::{CacheStore, StoreResult};

/// Ceiling on entries in the bounded video store.
pub const MAX_VIDEO_ENTRIES: usize = 5;

/// Ceiling on total payload bytes in the bounded video store.
pub const MAX_VIDEO_BYTES: u64 = 500 * 1024 * 1024;

/// FIFO eviction policy for a bounded store.
///
/// `enforce_limit` runs after every successful write to the bounded store.
/// The bound is eventual, not hard: a write racing an enforcement pass can
/// leave the store transiently over a ceiling, and the pass after the next
/// write corrects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    pub max_entries: usize,
    pub max_bytes: u64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_entries: MAX_VIDEO_ENTRIES,
            max_bytes: MAX_VIDEO_BYTES,
        }
    }
}

impl EvictionPolicy {
    /// Policy with explicit ceilings.
    pub fn new(max_entries: usize, max_bytes: u64) -> Self {
        Self {
            max_entries,
            max_bytes,
        }
    }

    /// Enforce both ceilings on `store`.
    ///
    /// The count check removes at most one entry per pass, which is enough
    /// because the pass runs after every single write. The size loop then
    /// removes oldest entries until the byte ceiling holds; it terminates
    /// because every iteration strictly shrinks the store.
    pub async fn enforce_limit(&self, store: &CacheStore) -> StoreResult<()> {
        let keys = store.keys().await?;
        if keys.len() > self.max_entries {
            if let Some(oldest) = keys.first() {
                store.delete(oldest).await?;
                debug!(
                    store = store.name(),
                    url = %oldest.url,
                    count = keys.len(),
                    "Evicted oldest entry over count ceiling"
                );
            }
        }

        let mut total = store.total_size().await?;
        while total > self.max_bytes {
            let remaining = store.keys().await?;
            let Some(oldest) = remaining.first() else {
                break;
            };
            store.delete(oldest).await?;
            debug!(
                store = store.name(),
                url = %oldest.url,
                total_bytes = total,
                "Evicted oldest entry over size ceiling"
            );
            total = store.total_size().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EntryKey, Stores, StoredResponse};
    use bytes::Bytes;

    fn key(name: &str) -> EntryKey {
        EntryKey::get(format!("https://cdn.example.com/{name}.mp4"))
    }

    fn response(len: usize) -> StoredResponse {
        StoredResponse::new(200, Some("video/mp4".to_string()), Bytes::from(vec![0u8; len]))
    }

    async fn video_store() -> crate::store::CacheStore {
        Stores::in_memory().open("video-cache-v1")
    }

    #[tokio::test]
    async fn test_count_ceiling_evicts_single_oldest() {
        let store = video_store().await;
        let policy = EvictionPolicy::new(2, u64::MAX);

        for name in ["a", "b", "c"] {
            store.put(key(name), response(100)).await.unwrap();
            policy.enforce_limit(&store).await.unwrap();
        }

        let keys = store.keys().await.unwrap();
        assert_eq!(keys, vec![key("b"), key("c")]);
    }

    #[tokio::test]
    async fn test_size_ceiling_evicts_until_under() {
        let store = video_store().await;
        let policy = EvictionPolicy::new(10, 250);

        for name in ["a", "b", "c"] {
            store.put(key(name), response(100)).await.unwrap();
            policy.enforce_limit(&store).await.unwrap();
        }

        let keys = store.keys().await.unwrap();
        assert_eq!(keys, vec![key("b"), key("c")]);
        assert!(store.total_size().await.unwrap() <= 250);
    }

    #[tokio::test]
    async fn test_oversized_entry_clears_store() {
        let store = video_store().await;
        let policy = EvictionPolicy::new(10, 250);

        store.put(key("small"), response(100)).await.unwrap();
        policy.enforce_limit(&store).await.unwrap();
        store.put(key("huge"), response(400)).await.unwrap();
        policy.enforce_limit(&store).await.unwrap();

        // Nothing fits under the ceiling once the oversized entry arrives,
        // so the loop drains the store and still terminates.
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_limits_hold_across_many_writes() {
        let store = video_store().await;
        let policy = EvictionPolicy::new(3, 500);

        for i in 0..20 {
            store.put(key(&format!("clip-{i}")), response(150)).await.unwrap();
            policy.enforce_limit(&store).await.unwrap();

            assert!(store.count().await.unwrap() <= 3);
            assert!(store.total_size().await.unwrap() <= 500);
        }

        // Survivors are the newest writes, oldest first.
        let keys = store.keys().await.unwrap();
        assert_eq!(
            keys,
            vec![key("clip-17"), key("clip-18"), key("clip-19")]
        );
    }

    #[tokio::test]
    async fn test_under_limit_store_is_untouched() {
        let store = video_store().await;
        let policy = EvictionPolicy::default();

        store.put(key("only"), response(100)).await.unwrap();
        policy.enforce_limit(&store).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec![key("only")]);
    }
}
