//! # Builder for GatewayConfig
//!
//! This module provides a builder pattern implementation for creating and
//! customizing GatewayConfig instances with a fluent API.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use medley_engine::GatewayConfig;
//!
//! let config = GatewayConfig::builder()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("MedleyDemo/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .with_origin("https://app.example.com")
//!     .in_memory()
//!     .build();
//!
//! assert!(config.cache_dir.is_none());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::GatewayConfig;
use crate::proxy::ProxyConfig;

/// Builder for creating GatewayConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct GatewayConfigBuilder {
    /// Internal config being built
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
        }
    }

    /// Persist stores under the given directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    /// Keep every store in process memory
    pub fn in_memory(mut self) -> Self {
        self.config.cache_dir = None;
        self
    }

    /// Rename the general-purpose store
    pub fn with_app_store(mut self, name: impl Into<String>) -> Self {
        self.config.app_store = name.into();
        self
    }

    /// Rename the bounded media store
    pub fn with_video_store(mut self, name: impl Into<String>) -> Self {
        self.config.video_store = name.into();
        self
    }

    /// Replace the shell warm-up manifest
    pub fn with_shell_manifest(mut self, manifest: Vec<String>) -> Self {
        self.config.shell_manifest = manifest;
        self
    }

    /// Set the origin shell manifest paths resolve against
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.origin = Some(origin.into());
        self
    }

    /// Set the entry-count ceiling for the media store
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.config.max_entries = max_entries;
        self
    }

    /// Set the byte-size ceiling for the media store
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.config.max_bytes = max_bytes;
        self
    }

    /// Set the time-to-live stamped on pinned media entries
    pub fn with_media_ttl(mut self, ttl: Duration) -> Self {
        self.config.media_ttl = ttl;
        self
    }

    /// Set the ceiling on bytes buffered from one upstream response
    pub fn with_max_buffer_bytes(mut self, max_buffer_bytes: u64) -> Self {
        self.config.max_buffer_bytes = max_buffer_bytes;
        self
    }

    /// Set the overall request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom header; invalid names or values are ignored
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(header_name), Ok(header_value)) = (
            HeaderName::from_bytes(name.as_ref().as_bytes()),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(header_name, header_value);
        }
        self
    }

    /// Replace all custom headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Set an explicit proxy configuration
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Set whether to use system proxy settings
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        self.config.use_system_proxy = use_system_proxy;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> GatewayConfig {
        self.config
    }
}

impl Default for GatewayConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
