//! # Store Backend Trait
//!
//! The interface every storage backend implements. Interception strategies
//! and eviction only ever talk to this trait, which is what lets the whole
//! pipeline run against the in-memory backend in tests.

use async_trait::async_trait;

use super::types::{EntryKey, EntryMeta, StoreResult, StoredResponse};

/// Backend for named response stores.
///
/// Operations are safe to invoke from concurrently running requests. `put`
/// replaces atomically: a concurrent reader observes either the previous
/// entry or the new one, never a torn write.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Keys of a named store in insertion order, oldest first.
    async fn keys(&self, store: &str) -> StoreResult<Vec<EntryKey>>;

    /// Look up one entry.
    async fn get(&self, store: &str, key: &EntryKey) -> StoreResult<Option<StoredResponse>>;

    /// Metadata-only lookup, so capacity accounting never reads payloads.
    async fn meta(&self, store: &str, key: &EntryKey) -> StoreResult<Option<EntryMeta>>;

    /// Insert or replace an entry. A replaced key moves to the newest
    /// insertion position.
    async fn put(&self, store: &str, key: EntryKey, response: StoredResponse) -> StoreResult<()>;

    /// Remove an entry. Returns `false` if the key was absent.
    async fn delete(&self, store: &str, key: &EntryKey) -> StoreResult<bool>;
}
