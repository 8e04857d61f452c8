//! Archive sources for the `memzip` CLI.
//!
//! Handles work on complete in-memory images, so a source only has to hand
//! over its whole body once.

mod http;
mod local;

pub use http::HttpSource;
pub use local::LocalSource;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::debug;

/// Something an archive image can be fetched from.
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetch the complete image.
    async fn fetch(&self) -> Result<Vec<u8>>;

    /// Bytes received over the network so far.
    fn transferred_bytes(&self) -> u64 {
        0
    }
}

pub fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Source for a local path or an HTTP(S) URL.
pub fn open_source(location: &str) -> Result<Box<dyn Source>> {
    if location.is_empty() {
        bail!("empty archive location");
    }
    if is_http_url(location) {
        Ok(Box::new(HttpSource::new(location)?))
    } else {
        Ok(Box::new(LocalSource::new(location)))
    }
}

/// Fetch an image from `source`, rejecting an empty body.
///
/// Returns the image and the number of bytes that crossed the network.
pub async fn fetch_image(source: &dyn Source) -> Result<(Vec<u8>, u64)> {
    let image = source.fetch().await?;
    if image.is_empty() {
        bail!("archive source is empty");
    }
    debug!(bytes = image.len(), "loaded archive source");
    Ok((image, source.transferred_bytes()))
}

/// Load an archive image from a local path or an HTTP(S) URL.
pub async fn load(location: &str) -> Result<(Vec<u8>, u64)> {
    let source = open_source(location)?;
    fetch_image(source.as_ref()).await
}
