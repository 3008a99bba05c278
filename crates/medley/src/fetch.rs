//! # Upstream Fetch
//!
//! The single seam between the gateway and the network. Strategies call
//! [`Upstream::fetch`] and nothing else, so tests substitute a scripted
//! implementation while production wires up [`HttpUpstream`] over a shared
//! reqwest client.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;
use rustls::{ClientConfig, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::proxy::build_proxy;

/// One fully buffered upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchedResponse {
    /// Whether the response is complete and successful. Partial content and
    /// error statuses pass through to the requester but are never stored.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }
}

/// Errors produced by one fetch attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure; the trigger for cache fallback.
    #[error("network failure: {0}")]
    Network(String),

    /// The response body exceeded the buffering ceiling.
    #[error("response body exceeded the {limit}-byte buffering ceiling")]
    TooLarge { limit: u64 },
}

pub type FetchResult = std::result::Result<FetchedResponse, FetchError>;

/// Upstream the gateway fetches through.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Perform one GET and buffer the full body.
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &GatewayConfig) -> GatewayResult<Client> {
    // Create the crypto provider
    let provider = Arc::new(ring::default_provider());

    // Build platform default TLS configuration
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("Failed to configure default TLS protocol versions")
        .with_platform_verifier()
        .unwrap()
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        // Explicit proxy configuration takes precedence
        let proxy = build_proxy(proxy_config).map_err(GatewayError::Proxy)?;
        client_builder = client_builder.proxy(proxy);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy for upstream fetches");
    } else if config.use_system_proxy {
        // reqwest picks up system proxy settings unless no_proxy() is called
        debug!("Using system proxy settings for upstream fetches");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for upstream fetches");
    }

    client_builder.build().map_err(GatewayError::from)
}

/// Production upstream over a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    max_buffer_bytes: u64,
}

impl HttpUpstream {
    /// Build a client from the configuration and wrap it.
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        Ok(Self {
            client: create_client(config)?,
            max_buffer_bytes: config.max_buffer_bytes,
        })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client, max_buffer_bytes: u64) -> Self {
        Self {
            client,
            max_buffer_bytes,
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, url: &str) -> FetchResult {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        // Stream the body so an oversized payload is cut off at the ceiling
        // instead of buffered whole.
        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Network(e.to_string()))?;
            if (body.len() + chunk.len()) as u64 > self.max_buffer_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_buffer_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, status = status, bytes = body.len(), "Fetched upstream response");
        Ok(FetchedResponse {
            status,
            content_type,
            body: body.freeze(),
        })
    }
}
