use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::Source;
use anyhow::{Result, bail};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRY: u32 = 5;

/// Archive downloaded with a single GET
pub struct HttpSource {
    client: Client,
    url: String,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpSource {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            transferred_bytes: AtomicU64::new(0),
            max_retry: MAX_RETRY,
        })
    }

    fn backoff(attempt: u32) -> Duration {
        Duration::from_millis(500 * u64::from(attempt))
    }
}

#[async_trait]
impl Source for HttpSource {
    /// Download the body, retrying connection failures with a linear backoff.
    async fn fetch(&self) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.client.get(&self.url).send().await {
                Ok(resp) => {
                    if resp.status() != StatusCode::OK {
                        bail!(
                            "HTTP request for {} failed with status: {}",
                            self.url,
                            resp.status()
                        );
                    }
                    let body = resp.bytes().await?;
                    self.transferred_bytes
                        .fetch_add(body.len() as u64, Ordering::Relaxed);
                    debug!(url = %self.url, bytes = body.len(), "downloaded archive");
                    return Ok(body.to_vec());
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    attempt += 1;
                    if attempt >= self.max_retry {
                        bail!("giving up on {} after {} attempts: {}", self.url, attempt, e);
                    }
                    warn!(
                        url = %self.url,
                        attempt,
                        max = self.max_retry,
                        error = %e,
                        "connection failed, retrying download"
                    );
                    tokio::time::sleep(Self::backoff(attempt)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }
}
