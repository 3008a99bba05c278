//! # Store Types
//!
//! Common types shared by the store backends: entry identity, the
//! response-header-like metadata persisted beside each payload, and the
//! storage error taxonomy.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Scheme prefix for client-pinned media keys.
///
/// Pinned media is keyed by an application identifier instead of the upstream
/// URL, so the same id keeps working when the upstream hands out a fresh
/// signed URL for the same object.
pub const MEDIA_KEY_PREFIX: &str = "app://media/";

/// Identity of one stored response: request method plus URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    /// Upper-case HTTP method.
    pub method: String,
    /// Full request URL, or a synthetic `app://` locator for pinned media.
    pub url: String,
}

impl EntryKey {
    /// Create a key from a method and URL.
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            url: url.into(),
        }
    }

    /// Create a GET key, the common case for interception lookups.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Synthetic key for a client-pinned media object.
    pub fn media(id: &str) -> Self {
        Self::get(format!("{MEDIA_KEY_PREFIX}{id}"))
    }

    /// The application identifier embedded in a pinned-media key, if any.
    pub fn media_id(&self) -> Option<&str> {
        self.url.strip_prefix(MEDIA_KEY_PREFIX)
    }

    /// Filename-safe digest of this key.
    pub fn to_filename(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b":");
        hasher.update(self.url.as_bytes());
        let hash = hasher.finalize();
        format!("{hash:x}")
    }
}

/// Metadata persisted beside each payload.
///
/// `expires_at` and `tag` belong to the pinned-media path; the store itself
/// never interprets them, it has no native TTL concept. `sequence` is the
/// insertion-order signal that eviction runs on; backends assign it on every
/// write, so replacing a key also moves it to the newest position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Upstream status code captured at write time.
    pub status: u16,
    /// Declared content type of the payload, if any.
    pub content_type: Option<String>,
    /// Payload length in bytes, captured at write time so capacity checks
    /// never have to re-read payloads.
    pub size: u64,
    /// When the entry was written, unix seconds.
    pub stored_at: u64,
    /// Monotonic insertion counter, assigned by the backend.
    pub sequence: u64,
    /// Absolute expiry, unix seconds. Pinned-media entries only.
    pub expires_at: Option<u64>,
    /// Application identifier tag. Pinned-media entries only.
    pub tag: Option<String>,
}

impl EntryMeta {
    /// Metadata for a fresh write.
    pub fn new(status: u16, size: u64) -> Self {
        Self {
            status,
            content_type: None,
            size,
            stored_at: unix_now(),
            sequence: 0,
            expires_at: None,
            tag: None,
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Stamp an absolute expiry `ttl` from the write time.
    pub fn with_expiry(mut self, ttl: Duration) -> Self {
        self.expires_at = Some(self.stored_at + ttl.as_secs());
        self
    }

    /// Stamp the application identifier tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Whether the entry has outlived its expiry stamp. Entries without a
    /// stamp never expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => unix_now() > expires_at,
            None => false,
        }
    }
}

/// One cached response: payload plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub meta: EntryMeta,
    pub body: Bytes,
}

impl StoredResponse {
    /// Build a response for storage; the size field is derived from the body.
    pub fn new(status: u16, content_type: Option<String>, body: Bytes) -> Self {
        let meta = EntryMeta::new(status, body.len() as u64).with_content_type(content_type);
        Self { meta, body }
    }
}

/// Storage failure taxonomy.
///
/// `Unavailable` is raised by the startup probe when the storage facility is
/// absent or unusable; it is permanent for the session and callers degrade to
/// cache-less operation instead of retrying per request.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cache storage unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Result of a store operation.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Current unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
