//! # Request Classification
//!
//! Assigns every intercepted request to a handling class. Classification is
//! a pure function of the request URL and its declared destination; the
//! chosen class selects the caching strategy in the gateway.

use url::Url;

use crate::store::EntryKey;

/// Path extensions treated as playable media.
const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "m4v", "mov", "mp3", "m4a", "ogg"];

/// Handling class of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Application shell resource named in the warm-up manifest.
    StaticAsset,
    /// Playable media, served cache-first from the bounded video store.
    MediaObject,
    /// Everything else, served network-first.
    Other,
}

/// Destination a client declared for a request, when it declared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    Document,
    Image,
    Script,
    Style,
    Font,
    Video,
    Audio,
    #[default]
    Unknown,
}

/// One intercepted resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub method: String,
    pub url: String,
    pub destination: Destination,
}

impl ResourceRequest {
    /// A GET request with no declared destination.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            destination: Destination::Unknown,
        }
    }

    /// Set the declared destination.
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Store key identifying this request.
    pub fn entry_key(&self) -> EntryKey {
        EntryKey::new(&self.method, self.url.clone())
    }
}

/// Classifies requests against a fixed shell manifest.
#[derive(Debug, Clone, Default)]
pub struct RequestClassifier {
    shell_paths: Vec<String>,
}

impl RequestClassifier {
    /// Build a classifier from the shell manifest. Entries are URL paths
    /// (`/`, `/favicon.png`); a leading `./` is normalized away.
    pub fn new(shell_manifest: &[String]) -> Self {
        let shell_paths = shell_manifest
            .iter()
            .map(|entry| {
                let trimmed = entry.trim_start_matches('.');
                if trimmed.starts_with('/') {
                    trimmed.to_string()
                } else {
                    format!("/{trimmed}")
                }
            })
            .collect();
        Self { shell_paths }
    }

    /// Classify one request.
    pub fn classify(&self, request: &ResourceRequest) -> RequestClass {
        if matches!(
            request.destination,
            Destination::Video | Destination::Audio
        ) {
            return RequestClass::MediaObject;
        }

        let path = match Url::parse(&request.url) {
            Ok(url) => url.path().to_string(),
            // Not an absolute URL; classify on the raw string.
            Err(_) => request.url.clone(),
        };

        if has_media_extension(&path) {
            return RequestClass::MediaObject;
        }

        if self.shell_paths.iter().any(|shell| shell == &path) {
            return RequestClass::StaticAsset;
        }

        RequestClass::Other
    }
}

fn has_media_extension(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    MEDIA_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
}
