//! # Media Gateway
//!
//! The interception pipeline. Every request is classified, routed through a
//! per-class strategy (cache-first for media and shell assets, network-first
//! for everything else), and always answered with a response object; on an
//! unrecoverable miss that response is a synthetic unavailable result, never
//! a raw error.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};
use url::Url;

use crate::classify::{RequestClass, RequestClassifier, ResourceRequest};
use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::eviction::EvictionPolicy;
use crate::fetch::{FetchedResponse, HttpUpstream, Upstream};
use crate::media_cache::MediaCache;
use crate::store::{CacheStore, EntryKey, StoredResponse, Stores};

const UNAVAILABLE_STATUS: u16 = 503;
const VIDEO_UNAVAILABLE: &str = "Video unavailable";
const RESOURCE_UNAVAILABLE: &str = "Resource unavailable";

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// Exact-key store hit before any network attempt.
    Cache,
    /// Live upstream response.
    Network,
    /// Store entry found after the network failed.
    CacheFallback,
    /// Synthetic unavailable response.
    Synthetic,
}

/// Response handed back to the requester.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub served_from: ServedFrom,
}

impl GatewayResponse {
    fn from_stored(stored: StoredResponse, served_from: ServedFrom) -> Self {
        let StoredResponse { meta, body } = stored;
        Self {
            status: meta.status,
            content_type: meta.content_type,
            body,
            served_from,
        }
    }

    fn from_fetched(response: FetchedResponse, served_from: ServedFrom) -> Self {
        Self {
            status: response.status,
            content_type: response.content_type,
            body: response.body,
            served_from,
        }
    }

    fn unavailable(text: &'static str) -> Self {
        Self {
            status: UNAVAILABLE_STATUS,
            content_type: Some("text/plain".to_string()),
            body: Bytes::from_static(text.as_bytes()),
            served_from: ServedFrom::Synthetic,
        }
    }

    /// Whether this is a synthetic unavailable response.
    pub fn is_synthetic(&self) -> bool {
        self.served_from == ServedFrom::Synthetic
    }
}

/// Occupancy snapshot for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayStatus {
    pub storage_available: bool,
    pub app_entries: usize,
    pub video_entries: usize,
    pub video_bytes: u64,
    pub max_entries: usize,
    pub max_bytes: u64,
}

/// Request-intercepting caching gateway.
///
/// The storage facility is probed exactly once, at construction. A failed
/// probe leaves the gateway cache-less for its whole lifetime: every lookup
/// misses, every populate is skipped, and the probe is never retried.
pub struct MediaGateway {
    classifier: RequestClassifier,
    stores: Option<Stores>,
    upstream: Arc<dyn Upstream>,
    eviction: EvictionPolicy,
    config: GatewayConfig,
}

impl MediaGateway {
    /// Construct a gateway with an HTTP upstream built from `config`.
    pub async fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let upstream: Arc<dyn Upstream> = Arc::new(HttpUpstream::new(&config)?);
        Ok(Self::with_upstream(config, upstream).await)
    }

    /// Construct a gateway with an explicit upstream, probing storage from
    /// the configuration.
    pub async fn with_upstream(config: GatewayConfig, upstream: Arc<dyn Upstream>) -> Self {
        let stores = match &config.cache_dir {
            Some(dir) => match Stores::on_disk(dir).await {
                Ok(stores) => Some(stores),
                Err(e) => {
                    warn!(error = %e, "Cache storage unavailable; running cache-less for this session");
                    None
                }
            },
            None => Some(Stores::in_memory()),
        };
        Self::from_parts(config, stores, upstream)
    }

    /// Assemble a gateway over externally constructed stores, skipping the
    /// storage probe. `None` means cache-less operation.
    pub fn from_parts(
        config: GatewayConfig,
        stores: Option<Stores>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        let classifier = RequestClassifier::new(&config.shell_manifest);
        let eviction = EvictionPolicy::new(config.max_entries, config.max_bytes);
        Self {
            classifier,
            stores,
            upstream,
            eviction,
            config,
        }
    }

    /// The store registry, absent when the session is cache-less.
    pub fn stores(&self) -> Option<&Stores> {
        self.stores.as_ref()
    }

    /// Pinned-media cache sharing this gateway's video store, upstream, and
    /// eviction ceilings.
    pub fn media_cache(&self) -> MediaCache {
        MediaCache::new(
            self.video_store(),
            self.upstream.clone(),
            self.config.media_ttl,
            self.eviction,
        )
    }

    fn app_store(&self) -> Option<CacheStore> {
        self.stores
            .as_ref()
            .map(|stores| stores.open(&self.config.app_store))
    }

    fn video_store(&self) -> Option<CacheStore> {
        self.stores
            .as_ref()
            .map(|stores| stores.open(&self.config.video_store))
    }

    /// Handle one intercepted request.
    pub async fn handle(&self, request: &ResourceRequest) -> GatewayResponse {
        match self.classifier.classify(request) {
            RequestClass::MediaObject => {
                self.cache_first(request, self.video_store(), true, VIDEO_UNAVAILABLE)
                    .await
            }
            RequestClass::StaticAsset => {
                self.cache_first(request, self.app_store(), false, RESOURCE_UNAVAILABLE)
                    .await
            }
            RequestClass::Other => self.network_first(request).await,
        }
    }

    /// Cache-first strategy: exact-key lookup, then network, then a second
    /// lookup before giving up. `bounded` selects the eviction pass after a
    /// populate.
    async fn cache_first(
        &self,
        request: &ResourceRequest,
        store: Option<CacheStore>,
        bounded: bool,
        unavailable_text: &'static str,
    ) -> GatewayResponse {
        let key = request.entry_key();

        if let Some(store) = &store {
            match store.get(&key).await {
                Ok(Some(found)) => {
                    debug!(url = %request.url, store = store.name(), "Cache hit");
                    return GatewayResponse::from_stored(found, ServedFrom::Cache);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(url = %request.url, error = %e, "Cache lookup failed; treating as miss")
                }
            }
        }

        match self.upstream.fetch(&request.url).await {
            Ok(response) => {
                if response.is_cacheable() {
                    if let Some(store) = &store {
                        self.populate(store, key, &response, bounded).await;
                    }
                } else {
                    debug!(
                        url = %request.url,
                        status = response.status,
                        "Upstream response not cacheable; passing through"
                    );
                }
                GatewayResponse::from_fetched(response, ServedFrom::Network)
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Upstream fetch failed; falling back to cache");
                // Second lookup: a concurrent population may have landed an
                // entry since the miss above.
                if let Some(store) = &store {
                    if let Ok(Some(found)) = store.get(&key).await {
                        return GatewayResponse::from_stored(found, ServedFrom::CacheFallback);
                    }
                }
                GatewayResponse::unavailable(unavailable_text)
            }
        }
    }

    /// Network-first strategy for unclassified requests. Successful
    /// responses pass straight through without being stored; the general
    /// store only answers when the network fails.
    async fn network_first(&self, request: &ResourceRequest) -> GatewayResponse {
        match self.upstream.fetch(&request.url).await {
            Ok(response) => GatewayResponse::from_fetched(response, ServedFrom::Network),
            Err(e) => {
                warn!(url = %request.url, error = %e, "Upstream fetch failed; falling back to general store");
                if let Some(store) = self.app_store() {
                    match store.match_url(&request.url).await {
                        Ok(Some(found)) => {
                            return GatewayResponse::from_stored(found, ServedFrom::CacheFallback);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(url = %request.url, error = %e, "Fallback lookup failed")
                        }
                    }
                }
                GatewayResponse::unavailable(RESOURCE_UNAVAILABLE)
            }
        }
    }

    /// Write-through after a successful fetch. Failures are logged, never
    /// surfaced: the requester still gets the live response.
    async fn populate(
        &self,
        store: &CacheStore,
        key: EntryKey,
        response: &FetchedResponse,
        bounded: bool,
    ) {
        let stored = StoredResponse::new(
            response.status,
            response.content_type.clone(),
            response.body.clone(),
        );
        if let Err(e) = store.put(key, stored).await {
            warn!(store = store.name(), error = %e, "Failed to populate cache");
            return;
        }
        if bounded {
            if let Err(e) = self.eviction.enforce_limit(store).await {
                warn!(store = store.name(), error = %e, "Eviction pass failed");
            }
        }
    }

    /// Precache the shell manifest into the general store, resolving each
    /// path against the configured origin. Returns the number of assets
    /// stored; individual failures are logged and skipped so one bad asset
    /// never blocks startup.
    pub async fn warm_shell(&self) -> GatewayResult<usize> {
        let Some(store) = self.app_store() else {
            debug!("No storage available; skipping shell warm-up");
            return Ok(0);
        };
        let Some(origin) = &self.config.origin else {
            debug!("No origin configured; skipping shell warm-up");
            return Ok(0);
        };

        let base = Url::parse(origin)?;
        let mut warmed = 0;
        for path in &self.config.shell_manifest {
            let target = match base.join(path) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    warn!(path = %path, error = %e, "Invalid shell manifest entry");
                    continue;
                }
            };

            match self.upstream.fetch(&target).await {
                Ok(response) if response.is_cacheable() => {
                    let stored = StoredResponse::new(
                        response.status,
                        response.content_type.clone(),
                        response.body,
                    );
                    match store.put(EntryKey::get(target.clone()), stored).await {
                        Ok(()) => warmed += 1,
                        Err(e) => warn!(url = %target, error = %e, "Failed to store shell asset"),
                    }
                }
                Ok(response) => {
                    warn!(
                        url = %target,
                        status = response.status,
                        "Shell asset fetch returned non-success status"
                    )
                }
                Err(e) => warn!(url = %target, error = %e, "Shell asset fetch failed"),
            }
        }

        info!(
            warmed,
            total = self.config.shell_manifest.len(),
            "Shell warm-up complete"
        );
        Ok(warmed)
    }

    /// Occupancy snapshot of both stores.
    pub async fn status(&self) -> GatewayResult<GatewayStatus> {
        let mut status = GatewayStatus {
            storage_available: self.stores.is_some(),
            app_entries: 0,
            video_entries: 0,
            video_bytes: 0,
            max_entries: self.config.max_entries,
            max_bytes: self.config.max_bytes,
        };

        if let (Some(app), Some(video)) = (self.app_store(), self.video_store()) {
            status.app_entries = app.count().await?;
            status.video_entries = video.count().await?;
            status.video_bytes = video.total_size().await?;
        }

        Ok(status)
    }
}
