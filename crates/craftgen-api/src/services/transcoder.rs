//! Copies provider-hosted images into durable object storage.
//!
//! Provider URLs expire within hours, so every generated image passes through
//! [`AssetTranscoder::transcode`] before it is returned to a caller. Each call
//! writes a new object under a fresh key.
//!
//! The placeholder substituted for a failed generation is never downloaded.
//! Its bytes ship with the binary and are stored like any other asset.

use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use tracing::{debug, info, instrument};

use craftgen_core::defaults::PLACEHOLDER_IMAGE_URL;
use craftgen_core::{AssetFetcher, Error, ObjectBody, ObjectStore, Result};
use craftgen_storage::{content_type_for, filename_from_url, object_key};

/// Image stored in place of a failed generation.
pub const PLACEHOLDER_PNG: &[u8] = include_bytes!("../../assets/placeholder.png");

/// Streams remote assets into an [`ObjectStore`].
#[derive(Clone)]
pub struct AssetTranscoder {
    fetcher: Arc<dyn AssetFetcher>,
    store: Arc<dyn ObjectStore>,
}

impl AssetTranscoder {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, store: Arc<dyn ObjectStore>) -> Self {
        Self { fetcher, store }
    }

    /// Whether `url` already points into our storage.
    pub fn is_durable(&self, url: &str) -> bool {
        self.store.is_durable_url(url)
    }

    /// Copy `remote_url` under `prefix` and return the durable URL.
    ///
    /// Bodies with an advertised length are streamed; others are buffered in
    /// memory first. Every failure is `AssetTranscode`.
    #[instrument(
        skip(self, remote_url),
        fields(subsystem = "pipeline", component = "transcoder", op = "transcode")
    )]
    pub async fn transcode(&self, remote_url: &str, prefix: &str) -> Result<String> {
        if remote_url == PLACEHOLDER_IMAGE_URL {
            return self.store_placeholder(prefix).await;
        }

        let start = Instant::now();
        let asset = self
            .fetcher
            .open(remote_url)
            .await
            .map_err(|e| Error::AssetTranscode(format!("download failed: {}", e)))?;

        let filename = filename_from_url(remote_url);
        let key = object_key(prefix, &filename, chrono::Utc::now());
        let content_type = asset
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| content_type_for(&filename))
            .to_string();

        let body = match asset.content_length {
            Some(length) => ObjectBody::Streamed {
                stream: asset.body,
                length,
            },
            None => {
                let buffered = asset
                    .body
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok::<_, Error>(acc)
                    })
                    .await
                    .map_err(|e| Error::AssetTranscode(format!("download interrupted: {}", e)))?;
                debug!(size_bytes = buffered.len(), "Length not advertised, buffered body");
                ObjectBody::Buffered(buffered.freeze())
            }
        };
        let size_bytes = body.len();
        let durable_url = self.put_durable(&key, body, &content_type).await?;

        info!(
            object_key = %key,
            size_bytes,
            content_type = %content_type,
            duration_ms = start.elapsed().as_millis() as u64,
            "Asset transcoded"
        );
        Ok(durable_url)
    }

    /// Store the bundled placeholder under `prefix` without any download.
    async fn store_placeholder(&self, prefix: &str) -> Result<String> {
        let key = object_key(prefix, "placeholder.png", chrono::Utc::now());
        let body = ObjectBody::Buffered(Bytes::from_static(PLACEHOLDER_PNG));
        let durable_url = self.put_durable(&key, body, "image/png").await?;
        info!(
            object_key = %key,
            size_bytes = PLACEHOLDER_PNG.len(),
            "Placeholder stored"
        );
        Ok(durable_url)
    }

    async fn put_durable(&self, key: &str, body: ObjectBody, content_type: &str) -> Result<String> {
        let durable_url = self
            .store
            .put_object(key, body, content_type)
            .await
            .map_err(|e| Error::AssetTranscode(format!("upload failed: {}", e)))?;

        if !self.store.is_durable_url(&durable_url) {
            return Err(Error::AssetTranscode(format!(
                "store returned a non-durable URL for {}",
                key
            )));
        }
        Ok(durable_url)
    }
}
