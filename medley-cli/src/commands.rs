use std::path::Path;

use medley_engine::{Destination, MediaGateway, MediaHandle, ResourceRequest, ServedFrom};
use tracing::info;

use crate::error::{AppError, Result};
use crate::utils::format_bytes;

pub struct CommandExecutor {
    gateway: MediaGateway,
}

impl CommandExecutor {
    pub fn new(gateway: MediaGateway) -> Self {
        Self { gateway }
    }

    /// Route one request through the gateway and report how it was served.
    pub async fn fetch(
        &self,
        url: &str,
        destination: Destination,
        output_file: Option<&Path>,
    ) -> Result<()> {
        let request = ResourceRequest::get(url).with_destination(destination);
        let response = self.gateway.handle(&request).await;

        println!("Status:       {}", response.status);
        println!("Served from:  {}", served_from_label(response.served_from));
        println!(
            "Content type: {}",
            response.content_type.as_deref().unwrap_or("unknown")
        );
        println!("Body size:    {}", format_bytes(response.body.len() as u64));

        if response.is_synthetic() {
            return Err(AppError::Unavailable(url.to_string()));
        }

        if let Some(path) = output_file {
            tokio::fs::write(path, &response.body).await?;
            println!("Saved body to {}", path.display());
        }

        Ok(())
    }

    pub async fn pin(&self, id: &str, url: &str) -> Result<()> {
        let cache = self.gateway.media_cache();
        cache.add_to_cache(id, url).await?;
        println!("Pinned '{id}' from {url}");
        Ok(())
    }

    pub async fn check(&self, id: &str) -> Result<()> {
        let cache = self.gateway.media_cache();
        if cache.is_cached(id).await {
            println!("'{id}' is cached");
        } else {
            println!("'{id}' is not cached");
        }
        Ok(())
    }

    /// Resolve a playable location, preferring the pinned copy over the network.
    pub async fn play(&self, id: &str, url: Option<&str>) -> Result<()> {
        let cache = self.gateway.media_cache();

        if let Some(handle) = cache.cached_handle(id).await? {
            println!("Playing '{id}' from local cache: {}", handle.location());
            handle.release();
            return Ok(());
        }

        let Some(url) = url else {
            return Err(AppError::InvalidInput(format!(
                "'{id}' is not cached and no source URL was given"
            )));
        };

        let handle = MediaHandle::remote(url);
        println!("Playing '{id}' from network: {}", handle.location());
        handle.release();

        // Population runs detached; hold the process open until it lands.
        info!(id = %id, "Caching media in the background for next time");
        let pin = cache.add_to_cache_detached(id, url);
        let _ = pin.await;
        Ok(())
    }

    pub async fn warm(&self) -> Result<()> {
        let warmed = self.gateway.warm_shell().await?;
        println!("Warmed {warmed} shell entries");
        Ok(())
    }

    pub async fn status(&self) -> Result<()> {
        let status = self.gateway.status().await?;

        let storage = if status.storage_available {
            "available"
        } else {
            "unavailable (cache-less session)"
        };
        println!("Storage:       {storage}");
        println!("App entries:   {}", status.app_entries);
        println!(
            "Video entries: {} (limit {})",
            status.video_entries, status.max_entries
        );
        println!(
            "Video bytes:   {} (limit {})",
            format_bytes(status.video_bytes),
            format_bytes(status.max_bytes)
        );
        Ok(())
    }
}

fn served_from_label(served_from: ServedFrom) -> &'static str {
    match served_from {
        ServedFrom::Cache => "cache",
        ServedFrom::Network => "network",
        ServedFrom::CacheFallback => "cache (network failed)",
        ServedFrom::Synthetic => "synthetic",
    }
}
