//! Streaming HTTP downloads of remote assets.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::debug;

use craftgen_core::defaults::FETCH_TIMEOUT_SECS;
use craftgen_core::{AssetFetcher, Error, RemoteAsset, Result};

/// Downloads provider-hosted assets over HTTP(S).
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a fetcher with its own client and request timeout.
    ///
    /// Reads `FETCH_TIMEOUT_SECS` (default 60).
    pub fn from_env() -> Result<Self> {
        let timeout = std::env::var("FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(FETCH_TIMEOUT_SECS);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn open(&self, url: &str) -> Result<RemoteAsset> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Request(format!("GET {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Request(format!("GET {} returned HTTP {}", url, status)));
        }

        let content_length = resp.content_length();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        debug!(content_length, content_type = ?content_type, "http_fetcher: opened");

        let body = resp
            .bytes_stream()
            .map_err(|e| Error::Request(format!("download interrupted: {}", e)));
        Ok(RemoteAsset {
            content_length,
            content_type,
            body: Box::pin(body),
        })
    }
}
