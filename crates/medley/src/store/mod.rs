//! # Response Stores
//!
//! Named key-to-response stores over pluggable backends. The gateway opens
//! one store per response class; everything above this module addresses
//! entries through [`CacheStore`] handles and never touches a backend
//! directly.

mod backend;
mod disk;
mod memory;
mod stores;
mod types;

pub use backend::StoreBackend;
pub use disk::DiskBackend;
pub use memory::MemoryBackend;
pub use stores::{CacheStore, Stores};
pub use types::{EntryKey, EntryMeta, StoreError, StoreResult, StoredResponse, MEDIA_KEY_PREFIX};
