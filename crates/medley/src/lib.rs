//! # Medley
//!
//! A request-intercepting caching gateway for media-heavy applications.
//! Classifies resource fetches, applies a per-class caching strategy, and
//! keeps the media store bounded with FIFO eviction.
//!
//! ## Features
//!
//! - Cache-first serving for media and application shell assets
//! - Network-first serving with store fallback for everything else
//! - Bounded video store with count and byte-size ceilings
//! - Pinned media keyed by application id with lazy 24-hour expiry
//! - Pluggable store backends (disk for production, memory for tests)

pub mod builder;
pub mod classify;
pub mod config;
pub mod error;
pub mod eviction;
pub mod fetch;
pub mod gateway;
pub mod handle;
pub mod media_cache;
pub mod proxy;
pub mod store;

pub use builder::GatewayConfigBuilder;
pub use config::{APP_STORE, GatewayConfig, VIDEO_STORE};
pub use error::{GatewayError, GatewayResult};

// Re-export the interception pipeline
pub use classify::{Destination, RequestClass, RequestClassifier, ResourceRequest};
pub use eviction::{EvictionPolicy, MAX_VIDEO_BYTES, MAX_VIDEO_ENTRIES};
pub use gateway::{GatewayResponse, GatewayStatus, MediaGateway, ServedFrom};

// Re-export the pinned-media path
pub use handle::MediaHandle;
pub use media_cache::MediaCache;

// Re-export store primitives for embedders with custom backends
pub use store::{
    CacheStore, DiskBackend, EntryKey, EntryMeta, MemoryBackend, StoreBackend, StoreError,
    StoreResult, StoredResponse, Stores,
};

// Re-export fetch utilities
pub use fetch::{FetchError, FetchedResponse, HttpUpstream, Upstream, create_client};

// Re-export proxy utilities
pub use proxy::ProxyConfig;
