//! # Proxy Support
//!
//! Upstream requests can be routed through an HTTP, HTTPS, or SOCKS5 proxy.
//! The proxy kind is taken from the URL scheme, so one configuration field
//! covers all three.

use reqwest::Proxy;

/// Proxy configuration for upstream fetches.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL, e.g. `http://proxy.example.com:8080` or
    /// `socks5://127.0.0.1:1080`.
    pub url: String,
    /// Basic-auth credentials, if the proxy requires them.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Proxy at `url` with no authentication.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Attach basic-auth credentials.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Build a reqwest proxy from our configuration.
pub fn build_proxy(config: &ProxyConfig) -> Result<Proxy, String> {
    // A bare host:port is assumed to be an HTTP proxy.
    let url = if config.url.contains("://") {
        config.url.clone()
    } else {
        format!("http://{}", config.url)
    };

    let mut proxy = Proxy::all(&url).map_err(|e| format!("Invalid proxy URL: {e}"))?;

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        proxy = proxy.basic_auth(username, password);
    }

    Ok(proxy)
}
