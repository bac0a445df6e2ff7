//! Download of provider-hosted assets.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::ProviderError;

/// Bytes of a remotely generated asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Fetches assets that providers host on their own CDN.
#[async_trait]
pub trait AssetFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, ProviderError>;
}

/// Largest asset accepted by default (50 MiB).
pub const DEFAULT_MAX_ASSET_BYTES: u64 = 50 * 1024 * 1024;

/// HTTP fetcher backed by [`reqwest`].
///
/// Bodies larger than `max_bytes` are rejected, whether or not the server
/// announces a `Content-Length`.
#[derive(Debug, Clone)]
pub struct HttpAssetFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpAssetFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(client)
    }

    /// Reuse an existing client (connection pooling across adapters).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: DEFAULT_MAX_ASSET_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    fn too_large(&self, url: &str) -> ProviderError {
        ProviderError::malformed(format!("asset at {url} exceeds {} bytes", self.max_bytes))
    }
}

impl Default for HttpAssetFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, ProviderError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: format!("asset download failed for {url}"),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large(url));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(self.too_large(url));
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(ProviderError::malformed(format!("empty asset at {url}")));
        }

        Ok(FetchedAsset {
            bytes,
            content_type,
        })
    }
}
