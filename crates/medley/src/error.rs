use crate::fetch::FetchError;
use crate::store::StoreError;

// Error type for gateway and pinned-media operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Upstream returned status code {0}")]
    Status(u16),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid proxy configuration: {0}")]
    Proxy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
