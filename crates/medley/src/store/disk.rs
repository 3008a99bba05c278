//! # Disk Backend
//!
//! Persistent store backend. Each entry is a payload file named by the key
//! digest plus a `.meta` JSON sidecar carrying the key and its metadata; the
//! sidecar is what lets `keys` rebuild insertion order across restarts.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use super::backend::StoreBackend;
use super::types::{EntryKey, EntryMeta, StoreError, StoreResult, StoredResponse};

/// On-disk companion record for one entry.
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    key: EntryKey,
    meta: EntryMeta,
}

/// Store backend persisting entries under a root directory, one
/// subdirectory per named store.
#[derive(Debug)]
pub struct DiskBackend {
    root: PathBuf,
    sequence: AtomicU64,
}

impl DiskBackend {
    /// Probe the storage root once at startup.
    ///
    /// Failure means storage is unusable for the whole session; callers
    /// degrade to cache-less operation instead of retrying per request. On
    /// success the insertion counter resumes past the highest sequence
    /// already on disk.
    pub async fn probe(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StoreError::Unavailable(format!("cache root {}: {e}", root.display()))
        })?;

        let highest = highest_sequence(&root)
            .await
            .map_err(|e| StoreError::Unavailable(format!("cache root {}: {e}", root.display())))?;

        debug!(root = ?root, resume_sequence = highest, "Cache storage ready");
        Ok(Self {
            root,
            sequence: AtomicU64::new(highest),
        })
    }

    fn store_dir(&self, store: &str) -> PathBuf {
        // Store names are fixed at configuration time; keep the mapping
        // filename-safe anyway.
        let safe: String = store
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        self.root.join(safe)
    }

    fn data_path(&self, store: &str, key: &EntryKey) -> PathBuf {
        self.store_dir(store).join(key.to_filename())
    }

    fn meta_path(&self, store: &str, key: &EntryKey) -> PathBuf {
        let mut path = self.data_path(store, key);
        path.set_extension("meta");
        path
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Highest insertion sequence recorded in any sidecar under `root`.
async fn highest_sequence(root: &Path) -> io::Result<u64> {
    let mut highest = 0;
    let mut stores = fs::read_dir(root).await?;
    while let Some(store) = stores.next_entry().await? {
        if !store.file_type().await?.is_dir() {
            continue;
        }
        let mut entries = fs::read_dir(store.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "meta") {
                match read_sidecar(&path).await {
                    Ok(sidecar) => highest = highest.max(sidecar.meta.sequence),
                    Err(e) => {
                        warn!(path = ?path, error = %e, "Skipping unreadable cache sidecar")
                    }
                }
            }
        }
    }
    Ok(highest)
}

async fn read_sidecar(path: &Path) -> StoreResult<Sidecar> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Best-effort removal of an entry's files without blocking the caller.
fn remove_in_background(data_path: PathBuf, meta_path: PathBuf) {
    tokio::spawn(async move {
        let _ = fs::remove_file(&data_path).await;
        let _ = fs::remove_file(&meta_path).await;
    });
}

#[async_trait]
impl StoreBackend for DiskBackend {
    async fn keys(&self, store: &str) -> StoreResult<Vec<EntryKey>> {
        let dir = self.store_dir(store);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sequenced = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "meta") {
                continue;
            }
            match read_sidecar(&path).await {
                Ok(sidecar) => sequenced.push((sidecar.meta.sequence, sidecar.key)),
                Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable cache sidecar"),
            }
        }

        sequenced.sort_by_key(|(sequence, _)| *sequence);
        Ok(sequenced.into_iter().map(|(_, key)| key).collect())
    }

    async fn get(&self, store: &str, key: &EntryKey) -> StoreResult<Option<StoredResponse>> {
        let data_path = self.data_path(store, key);
        let meta_path = self.meta_path(store, key);

        let meta_bytes = match fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let sidecar: Sidecar = match serde_json::from_slice(&meta_bytes) {
            Ok(sidecar) => sidecar,
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Dropping entry with corrupt sidecar");
                remove_in_background(data_path, meta_path);
                return Ok(None);
            }
        };

        let body = match fs::read(&data_path).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(StoredResponse {
            meta: sidecar.meta,
            body,
        }))
    }

    async fn meta(&self, store: &str, key: &EntryKey) -> StoreResult<Option<EntryMeta>> {
        let meta_path = self.meta_path(store, key);
        let meta_bytes = match fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<Sidecar>(&meta_bytes) {
            Ok(sidecar) => Ok(Some(sidecar.meta)),
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Unreadable cache sidecar");
                Ok(None)
            }
        }
    }

    async fn put(&self, store: &str, key: EntryKey, mut response: StoredResponse) -> StoreResult<()> {
        let dir = self.store_dir(store);
        fs::create_dir_all(&dir).await?;

        let sequence = self.next_sequence();
        response.meta.sequence = sequence;

        let data_path = self.data_path(store, &key);
        let meta_path = self.meta_path(store, &key);
        let sidecar = Sidecar {
            meta: response.meta.clone(),
            key,
        };
        let sidecar_json = serde_json::to_vec(&sidecar)?;

        // Write to temporaries first, then rename over the final names so a
        // concurrent reader never observes a torn entry. The temp names carry
        // the write's sequence so racing writers of the same key never share
        // a temporary.
        let temp_data_path = data_path.with_extension(format!("{sequence}.tmp"));
        let temp_meta_path = meta_path.with_extension(format!("{sequence}.meta.tmp"));

        if let Err(e) = fs::write(&temp_data_path, &response.body).await {
            warn!(path = ?temp_data_path, error = %e, "Failed to write cache payload file");
            return Err(e.into());
        }

        if let Err(e) = fs::write(&temp_meta_path, &sidecar_json).await {
            warn!(path = ?temp_meta_path, error = %e, "Failed to write cache sidecar file");
            let _ = fs::remove_file(&temp_data_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_data_path, &data_path).await {
            warn!(
                from = ?temp_data_path,
                to = ?data_path,
                error = %e,
                "Failed to move cache payload into place"
            );
            let _ = fs::remove_file(&temp_data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_meta_path, &meta_path).await {
            warn!(
                from = ?temp_meta_path,
                to = ?meta_path,
                error = %e,
                "Failed to move cache sidecar into place"
            );
            // The payload landed but the sidecar did not; remove the payload
            // rather than leave a half-entry behind.
            let _ = fs::remove_file(&data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(e.into());
        }

        debug!(key = ?sidecar.key, store = store, "Cached entry to disk");
        Ok(())
    }

    async fn delete(&self, store: &str, key: &EntryKey) -> StoreResult<bool> {
        let data_path = self.data_path(store, key);
        let meta_path = self.meta_path(store, key);

        let removed = match fs::remove_file(&data_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = ?data_path, error = %e, "Failed to remove cache payload file");
                return Err(e.into());
            }
        };

        match fs::remove_file(&meta_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Failed to remove cache sidecar file");
                return Err(e.into());
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[inline]
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    fn key(name: &str) -> EntryKey {
        EntryKey::get(format!("https://example.com/{name}"))
    }

    fn response(body: &str) -> StoredResponse {
        StoredResponse::new(
            200,
            Some("application/octet-stream".to_string()),
            Bytes::from(body.to_string()),
        )
    }

    #[tokio::test]
    async fn test_probe_creates_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("cache");

        DiskBackend::probe(&root).await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_put_and_get_roundtrip() {
        let dir = tempdir().unwrap();
        let backend = DiskBackend::probe(dir.path()).await.unwrap();

        backend.put("app", key("a"), response("payload")).await.unwrap();

        let found = backend.get("app", &key("a")).await.unwrap().unwrap();
        assert_eq!(found.body, Bytes::from("payload"));
        assert_eq!(found.meta.status, 200);
        assert_eq!(
            found.meta.content_type.as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(found.meta.size, 7);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let dir = tempdir().unwrap();
        let backend = DiskBackend::probe(dir.path()).await.unwrap();

        assert!(backend.get("app", &key("absent")).await.unwrap().is_none());
        assert!(backend.meta("app", &key("absent")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_follow_insertion_order() {
        let dir = tempdir().unwrap();
        let backend = DiskBackend::probe(dir.path()).await.unwrap();

        backend.put("video", key("one"), response("1")).await.unwrap();
        backend.put("video", key("two"), response("2")).await.unwrap();
        backend.put("video", key("three"), response("3")).await.unwrap();

        let keys = backend.keys("video").await.unwrap();
        assert_eq!(keys, vec![key("one"), key("two"), key("three")]);
    }

    #[tokio::test]
    async fn test_overwrite_moves_key_to_newest() {
        let dir = tempdir().unwrap();
        let backend = DiskBackend::probe(dir.path()).await.unwrap();

        backend.put("video", key("a"), response("old")).await.unwrap();
        backend.put("video", key("b"), response("b")).await.unwrap();
        backend.put("video", key("a"), response("new")).await.unwrap();

        let keys = backend.keys("video").await.unwrap();
        assert_eq!(keys, vec![key("b"), key("a")]);

        let found = backend.get("video", &key("a")).await.unwrap().unwrap();
        assert_eq!(found.body, Bytes::from("new"));
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempdir().unwrap();
        let backend = DiskBackend::probe(dir.path()).await.unwrap();

        backend.put("app", key("a"), response("a")).await.unwrap();
        assert!(backend.delete("app", &key("a")).await.unwrap());
        assert!(!backend.delete("app", &key("a")).await.unwrap());
        assert!(backend.get("app", &key("a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_order_survives_reprobe() {
        let dir = tempdir().unwrap();
        {
            let backend = DiskBackend::probe(dir.path()).await.unwrap();
            backend.put("video", key("old"), response("1")).await.unwrap();
        }

        let backend = DiskBackend::probe(dir.path()).await.unwrap();
        backend.put("video", key("new"), response("2")).await.unwrap();

        let keys = backend.keys("video").await.unwrap();
        assert_eq!(keys, vec![key("old"), key("new")]);
    }

    #[tokio::test]
    async fn test_concurrent_puts_of_same_key_stay_whole() {
        init_tracing();
        let dir = tempdir().unwrap();
        let backend = DiskBackend::probe(dir.path()).await.unwrap();

        let body = "same frames either way";
        tokio::join!(
            async { backend.put("video", key("clip"), response(body)).await.unwrap() },
            async { backend.put("video", key("clip"), response(body)).await.unwrap() },
        );

        // Whichever write lands last, the visible entry is a whole one.
        let found = backend.get("video", &key("clip")).await.unwrap().unwrap();
        assert_eq!(found.body, Bytes::from(body));
        assert_eq!(found.meta.size, body.len() as u64);
        assert_eq!(backend.keys("video").await.unwrap(), vec![key("clip")]);

        // Both writers consumed their temporaries.
        let mut entries = fs::read_dir(dir.path().join("video")).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name();
            assert!(
                !name.to_string_lossy().ends_with(".tmp"),
                "leftover temporary {name:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_corrupt_sidecar_is_skipped() {
        init_tracing();
        let dir = tempdir().unwrap();
        let backend = DiskBackend::probe(dir.path()).await.unwrap();

        backend.put("app", key("good"), response("ok")).await.unwrap();
        let bad = dir.path().join("app").join("not-json.meta");
        fs::write(&bad, b"{ definitely not json").await.unwrap();

        let keys = backend.keys("app").await.unwrap();
        assert_eq!(keys, vec![key("good")]);
    }
}
