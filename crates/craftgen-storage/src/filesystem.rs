//! Filesystem object store.
//!
//! Objects live under `{base_path}/{key}` and are addressed publicly as
//! `{public_base_url}/{key}`. The API server serves that prefix.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use craftgen_core::{Error, ObjectBody, ObjectStore, Result};

/// Filesystem storage backend.
pub struct FilesystemStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl FilesystemStore {
    /// Create a store rooted at `base_path`, addressed under `public_base_url`.
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a key to a path, refusing anything that escapes the base.
    fn full_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::InvalidInput(format!("invalid object key '{}'", key)));
        }
        Ok(self.base_path.join(relative))
    }

    fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.public_base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
    }

    /// Check the store can write, read and delete at startup.
    pub async fn validate(&self) -> Result<()> {
        let probe = ".health-check/probe.bin";
        let data = bytes::Bytes::from_static(b"storage-health-check");
        self.put_object(probe, ObjectBody::Buffered(data.clone()), "application/octet-stream")
            .await?;
        let path = self.full_path(probe)?;
        let read_back = fs::read(&path).await?;
        if read_back != data {
            return Err(Error::Storage("read-back mismatch".to_string()));
        }
        fs::remove_file(&path).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put_object(
        &self,
        key: &str,
        body: ObjectBody,
        _content_type: &str,
    ) -> Result<String> {
        let full_path = self.full_path(key)?;
        debug!(object_key = %key, size_bytes = body.len(), "filesystem_store: put");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "filesystem_store: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("part");
        let mut file = fs::File::create(&temp_path).await?;
        let written = match body {
            ObjectBody::Buffered(bytes) => {
                file.write_all(&bytes).await?;
                bytes.len() as u64
            }
            ObjectBody::Streamed { mut stream, length } => {
                let mut written = 0u64;
                while let Some(chunk) = stream.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            drop(file);
                            let _ = fs::remove_file(&temp_path).await;
                            return Err(e);
                        }
                    };
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }
                if written != length {
                    warn!(
                        object_key = %key,
                        expected = length,
                        written,
                        "filesystem_store: stream length differs from advertised length"
                    );
                }
                written
            }
        };
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "filesystem_store: rename failed");
            e
        })?;

        debug!(object_key = %key, size_bytes = written, "filesystem_store: stored");
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let key = self
            .key_for_url(url)
            .ok_or_else(|| Error::InvalidInput(format!("'{}' is not a stored object URL", url)))?;
        let path = self.full_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object '{}'", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn is_durable_url(&self, url: &str) -> bool {
        self.key_for_url(url).is_some()
    }
}
