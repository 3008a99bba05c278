//! # Pinned Media Cache
//!
//! The direct cache path presentation code drives by media id, independent
//! of request interception. Entries are keyed by an `app://media/` locator
//! built from the id rather than the upstream URL, stamped with an expiry
//! and an id tag, and checked lazily on access; there is no background
//! sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::eviction::EvictionPolicy;
use crate::fetch::Upstream;
use crate::handle::MediaHandle;
use crate::store::{CacheStore, EntryKey, EntryMeta, StoreError, StoredResponse};

/// Cache for media pinned by application id.
///
/// Clones share the same store and upstream, which is what lets
/// [`MediaCache::add_to_cache_detached`] hand a clone to a background task.
#[derive(Clone)]
pub struct MediaCache {
    store: Option<CacheStore>,
    upstream: Arc<dyn Upstream>,
    ttl: Duration,
    eviction: EvictionPolicy,
}

impl MediaCache {
    /// Build over the bounded media store. `None` means the session has no
    /// storage; every query then reports not-cached. Pins count against the
    /// same ceilings as intercepted media, so the store's eviction policy
    /// comes in here too.
    pub fn new(
        store: Option<CacheStore>,
        upstream: Arc<dyn Upstream>,
        ttl: Duration,
        eviction: EvictionPolicy,
    ) -> Self {
        Self {
            store,
            upstream,
            ttl,
            eviction,
        }
    }

    /// Whether a fresh entry exists for `id`.
    ///
    /// Finding an expired entry deletes it and reports `false`. Storage
    /// errors are logged and read as not-cached.
    pub async fn is_cached(&self, id: &str) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        let key = EntryKey::media(id);

        match store.meta(&key).await {
            Ok(Some(meta)) => {
                if meta.is_expired() {
                    debug!(id = %id, "Pinned media expired; deleting lazily");
                    if let Err(e) = store.delete(&key).await {
                        warn!(id = %id, error = %e, "Failed to delete expired media entry");
                    }
                    false
                } else {
                    true
                }
            }
            Ok(None) => false,
            Err(e) => {
                warn!(id = %id, error = %e, "Pinned media lookup failed");
                false
            }
        }
    }

    /// Fetch `url` and pin the payload under `id`.
    ///
    /// Only a fully successful response is stored. The entry carries the
    /// configured expiry and the id tag; because the key embeds the id and
    /// not the URL, the pin keeps working when the upstream rotates to a
    /// fresh signed URL for the same object. A landed pin is followed by an
    /// eviction pass, the same as a populate on the interception path.
    pub async fn add_to_cache(&self, id: &str, url: &str) -> GatewayResult<()> {
        let Some(store) = &self.store else {
            return Err(GatewayError::Store(StoreError::Unavailable(
                "no storage for this session".to_string(),
            )));
        };

        let response = self.upstream.fetch(url).await?;
        if !response.is_cacheable() {
            return Err(GatewayError::Status(response.status));
        }

        let meta = EntryMeta::new(response.status, response.body.len() as u64)
            .with_content_type(response.content_type)
            .with_expiry(self.ttl)
            .with_tag(id);
        let stored = StoredResponse {
            meta,
            body: response.body,
        };
        store.put(EntryKey::media(id), stored).await?;

        // The pin itself landed; a failed eviction pass is housekeeping and
        // must not report the pin as lost.
        if let Err(e) = self.eviction.enforce_limit(store).await {
            warn!(store = store.name(), error = %e, "Eviction pass failed");
        }

        info!(id = %id, url = %url, "Pinned media cached");
        Ok(())
    }

    /// Fire-and-forget variant of [`MediaCache::add_to_cache`].
    ///
    /// The caller never awaits the task, so there is no ordering guarantee
    /// relative to subsequent reads; failures are logged, not surfaced. The
    /// join handle is returned for callers that want to observe completion
    /// anyway (tests, shutdown paths).
    pub fn add_to_cache_detached(&self, id: &str, url: &str) -> JoinHandle<()> {
        let cache = self.clone();
        let id = id.to_string();
        let url = url.to_string();
        tokio::spawn(async move {
            if let Err(e) = cache.add_to_cache(&id, &url).await {
                warn!(id = %id, url = %url, error = %e, "Background media pin failed");
            }
        })
    }

    /// Materialize the pinned payload into a temporary local file and hand
    /// back its handle.
    ///
    /// The caller owns the handle and must release it when the consuming
    /// player is torn down. Expiry is honored the same way as
    /// [`MediaCache::is_cached`]: an expired entry is deleted and reads as
    /// absent.
    pub async fn cached_handle(&self, id: &str) -> GatewayResult<Option<MediaHandle>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let key = EntryKey::media(id);

        let Some(found) = store.get(&key).await? else {
            return Ok(None);
        };
        if found.meta.is_expired() {
            debug!(id = %id, "Pinned media expired; deleting lazily");
            store.delete(&key).await?;
            return Ok(None);
        }

        // Write the payload out on the blocking pool; payloads run to
        // hundreds of megabytes.
        let body = found.body;
        let temp_path =
            tokio::task::spawn_blocking(move || -> std::io::Result<tempfile::TempPath> {
                use std::io::Write;

                let mut file = tempfile::NamedTempFile::new()?;
                file.write_all(&body)?;
                file.flush()?;
                Ok(file.into_temp_path())
            })
            .await
            .map_err(std::io::Error::other)??;

        debug!(id = %id, path = ?temp_path, "Materialized pinned media");
        Ok(Some(MediaHandle::materialized(temp_path)))
    }

    /// The full caller protocol in one call: a materialized handle when the
    /// pin is fresh, otherwise a remote handle for `url` with a detached pin
    /// started for next time.
    ///
    /// Never fails; a storage error degrades to the remote handle the same
    /// way a miss does.
    pub async fn resolve(&self, id: &str, url: &str) -> MediaHandle {
        match self.cached_handle(id).await {
            Ok(Some(handle)) => return handle,
            Ok(None) => {}
            Err(e) => {
                warn!(id = %id, error = %e, "Pinned media resolve failed; falling back to remote")
            }
        }

        let _ = self.add_to_cache_detached(id, url);
        MediaHandle::remote(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, FetchResult, FetchedResponse};
    use crate::store::Stores;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const TTL: Duration = Duration::from_secs(24 * 60 * 60);

    #[derive(Default)]
    struct FakeUpstream {
        responses: Mutex<HashMap<String, FetchResult>>,
    }

    impl FakeUpstream {
        fn new() -> Self {
            Self::default()
        }

        fn ok(self, url: &str, body: &str) -> Self {
            self.responses.lock().insert(
                url.to_string(),
                Ok(FetchedResponse {
                    status: 200,
                    content_type: Some("video/mp4".to_string()),
                    body: Bytes::from(body.to_string()),
                }),
            );
            self
        }

        fn status(self, url: &str, status: u16) -> Self {
            self.responses.lock().insert(
                url.to_string(),
                Ok(FetchedResponse {
                    status,
                    content_type: None,
                    body: Bytes::new(),
                }),
            );
            self
        }

        fn failing(self, url: &str) -> Self {
            self.responses.lock().insert(
                url.to_string(),
                Err(FetchError::Network("connection refused".to_string())),
            );
            self
        }
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        async fn fetch(&self, url: &str) -> FetchResult {
            self.responses
                .lock()
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Network(format!("no route to {url}"))))
        }
    }

    fn cache_with(upstream: FakeUpstream) -> (MediaCache, CacheStore) {
        cache_with_policy(upstream, EvictionPolicy::default())
    }

    fn cache_with_policy(
        upstream: FakeUpstream,
        policy: EvictionPolicy,
    ) -> (MediaCache, CacheStore) {
        let store = Stores::in_memory().open("video-cache-v1");
        let cache = MediaCache::new(Some(store.clone()), Arc::new(upstream), TTL, policy);
        (cache, store)
    }

    /// Entry whose expiry stamp is already in the past.
    fn expired_entry(id: &str) -> StoredResponse {
        let mut stored = StoredResponse::new(
            200,
            Some("video/mp4".to_string()),
            Bytes::from_static(b"stale frames"),
        );
        stored.meta.expires_at = Some(stored.meta.stored_at.saturating_sub(120));
        stored.meta.tag = Some(id.to_string());
        stored
    }

    #[tokio::test]
    async fn test_add_then_is_cached() {
        let url = "https://cdn.example.com/signed/abc123.mp4";
        let (cache, store) = cache_with(FakeUpstream::new().ok(url, "frames"));

        cache.add_to_cache("v1", url).await.unwrap();
        assert!(cache.is_cached("v1").await);

        let stored = store.get(&EntryKey::media("v1")).await.unwrap().unwrap();
        assert_eq!(stored.meta.tag.as_deref(), Some("v1"));
        assert_eq!(
            stored.meta.expires_at,
            Some(stored.meta.stored_at + TTL.as_secs())
        );
        assert_eq!(stored.body, Bytes::from("frames"));
    }

    #[tokio::test]
    async fn test_pin_survives_url_rotation() {
        let first = "https://cdn.example.com/signed/token-1.mp4";
        let second = "https://cdn.example.com/signed/token-2.mp4";
        let (cache, store) = cache_with(FakeUpstream::new().ok(first, "frames").ok(second, "frames v2"));

        cache.add_to_cache("v1", first).await.unwrap();
        cache.add_to_cache("v1", second).await.unwrap();

        // Same id, one entry, newest payload.
        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get(&EntryKey::media("v1")).await.unwrap().unwrap();
        assert_eq!(stored.body, Bytes::from("frames v2"));
    }

    #[tokio::test]
    async fn test_pin_evicts_oldest_over_entry_ceiling() {
        let urls = [
            "https://cdn.example.com/signed/token-1.mp4",
            "https://cdn.example.com/signed/token-2.mp4",
            "https://cdn.example.com/signed/token-3.mp4",
        ];
        let mut upstream = FakeUpstream::new();
        for url in urls {
            upstream = upstream.ok(url, "frames");
        }
        let (cache, store) = cache_with_policy(upstream, EvictionPolicy::new(2, u64::MAX));

        for (i, url) in urls.iter().enumerate() {
            cache.add_to_cache(&format!("v{i}"), url).await.unwrap();
        }

        // Pins are bounded like any other video-store write: the oldest one
        // goes once the ceiling is crossed.
        assert_eq!(
            store.keys().await.unwrap(),
            vec![EntryKey::media("v1"), EntryKey::media("v2")]
        );
        assert!(!cache.is_cached("v0").await);
        assert!(cache.is_cached("v2").await);
    }

    #[tokio::test]
    async fn test_pin_evicts_oldest_over_size_ceiling() {
        let first = "https://cdn.example.com/signed/token-1.mp4";
        let second = "https://cdn.example.com/signed/token-2.mp4";
        let upstream = FakeUpstream::new()
            .ok(first, "0123456789")
            .ok(second, "0123456789");
        let (cache, store) = cache_with_policy(upstream, EvictionPolicy::new(10, 15));

        cache.add_to_cache("v1", first).await.unwrap();
        cache.add_to_cache("v2", second).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec![EntryKey::media("v2")]);
        assert!(store.total_size().await.unwrap() <= 15);
    }

    #[tokio::test]
    async fn test_absent_id_is_not_cached() {
        let (cache, _) = cache_with(FakeUpstream::new());
        assert!(!cache.is_cached("missing").await);
        assert!(cache.cached_handle("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_rejects_non_success() {
        let url = "https://cdn.example.com/signed/abc123.mp4";
        let (cache, store) = cache_with(FakeUpstream::new().status(url, 404));

        let err = cache.add_to_cache("v1", url).await.unwrap_err();
        assert!(matches!(err, GatewayError::Status(404)));
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_deleted_lazily() {
        let (cache, store) = cache_with(FakeUpstream::new());
        store
            .put(EntryKey::media("v1"), expired_entry("v1"))
            .await
            .unwrap();

        assert!(!cache.is_cached("v1").await);
        // The expiry check removed the underlying entry.
        assert!(store.get(&EntryKey::media("v1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cached_handle_honors_expiry() {
        let (cache, store) = cache_with(FakeUpstream::new());
        store
            .put(EntryKey::media("v1"), expired_entry("v1"))
            .await
            .unwrap();

        assert!(cache.cached_handle("v1").await.unwrap().is_none());
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cached_handle_materializes_payload() {
        let url = "https://cdn.example.com/signed/abc123.mp4";
        let (cache, _) = cache_with(FakeUpstream::new().ok(url, "frames"));
        cache.add_to_cache("v1", url).await.unwrap();

        let handle = cache.cached_handle("v1").await.unwrap().unwrap();
        assert!(handle.is_materialized());

        let path = handle.path().unwrap().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"frames");

        handle.release();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_detached_add_populates_in_background() {
        let url = "https://cdn.example.com/signed/abc123.mp4";
        let (cache, _) = cache_with(FakeUpstream::new().ok(url, "frames"));

        cache.add_to_cache_detached("v1", url).await.unwrap();
        assert!(cache.is_cached("v1").await);
    }

    #[tokio::test]
    async fn test_detached_add_swallows_failures() {
        let url = "https://cdn.example.com/signed/broken.mp4";
        let (cache, _) = cache_with(FakeUpstream::new().failing(url));

        // The task completes without panicking and nothing is stored.
        cache.add_to_cache_detached("v1", url).await.unwrap();
        assert!(!cache.is_cached("v1").await);
    }

    #[tokio::test]
    async fn test_resolve_prefers_cached_copy() {
        let url = "https://cdn.example.com/signed/abc123.mp4";
        let (cache, _) = cache_with(FakeUpstream::new().ok(url, "frames"));
        cache.add_to_cache("v1", url).await.unwrap();

        let handle = cache.resolve("v1", url).await;
        assert!(handle.is_materialized());
        handle.release();
    }

    #[tokio::test]
    async fn test_resolve_miss_returns_remote_and_pins() {
        let url = "https://cdn.example.com/signed/abc123.mp4";
        let (cache, _) = cache_with(FakeUpstream::new().ok(url, "frames"));

        let handle = cache.resolve("v1", url).await;
        assert!(!handle.is_materialized());
        assert_eq!(handle.location(), url);
        handle.release();

        // The detached pin lands shortly after.
        for _ in 0..50 {
            if cache.is_cached("v1").await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background pin never landed");
    }

    #[tokio::test]
    async fn test_no_storage_reports_not_cached() {
        let cache = MediaCache::new(
            None,
            Arc::new(FakeUpstream::new()),
            TTL,
            EvictionPolicy::default(),
        );

        assert!(!cache.is_cached("v1").await);
        assert!(cache.cached_handle("v1").await.unwrap().is_none());
        assert!(cache.add_to_cache("v1", "https://cdn.example.com/a.mp4").await.is_err());
    }
}
