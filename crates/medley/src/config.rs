use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::eviction::{MAX_VIDEO_BYTES, MAX_VIDEO_ENTRIES};
use crate::proxy::ProxyConfig;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Name of the general-purpose store holding shell and fallback entries.
pub const APP_STORE: &str = "app-cache-v1";

/// Name of the bounded store holding media payloads.
pub const VIDEO_STORE: &str = "video-cache-v1";

/// Configurable options for the gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Root directory for persistent storage. `None` keeps every store in
    /// process memory.
    pub cache_dir: Option<PathBuf>,

    /// Name of the general-purpose store.
    pub app_store: String,

    /// Name of the bounded media store.
    pub video_store: String,

    /// Shell resources warmed into the general store at startup and
    /// classified as static assets. Entries are URL paths.
    pub shell_manifest: Vec<String>,

    /// Origin the shell manifest paths resolve against for warm-up,
    /// e.g. `https://app.example.com`. Warm-up is skipped when unset.
    pub origin: Option<String>,

    /// Entry-count ceiling for the media store.
    pub max_entries: usize,

    /// Byte-size ceiling for the media store.
    pub max_bytes: u64,

    /// Time-to-live stamped on pinned media entries.
    pub media_ttl: Duration,

    /// Ceiling on bytes buffered from a single upstream response.
    pub max_buffer_bytes: u64,

    /// Overall timeout for one upstream request. Zero disables it.
    pub timeout: Duration,

    /// Connection timeout. Zero disables it.
    pub connect_timeout: Duration,

    /// Whether to follow redirects.
    pub follow_redirects: bool,

    /// User agent string.
    pub user_agent: String,

    /// Custom HTTP headers for upstream requests.
    pub headers: HeaderMap,

    /// Proxy configuration (optional).
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available.
    pub use_system_proxy: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_dir: Some(std::env::temp_dir().join("medley-cache")),
            app_store: APP_STORE.to_string(),
            video_store: VIDEO_STORE.to_string(),
            shell_manifest: vec!["/".to_string(), "/favicon.png".to_string()],
            origin: None,
            max_entries: MAX_VIDEO_ENTRIES,
            max_bytes: MAX_VIDEO_BYTES,
            media_ttl: Duration::from_secs(24 * 60 * 60),
            max_buffer_bytes: MAX_VIDEO_BYTES,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: GatewayConfig::default_headers(),
            proxy: None,
            use_system_proxy: true,
        }
    }
}

impl GatewayConfig {
    pub fn builder() -> crate::builder::GatewayConfigBuilder {
        crate::builder::GatewayConfigBuilder::new()
    }

    pub fn default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers
    }
}
