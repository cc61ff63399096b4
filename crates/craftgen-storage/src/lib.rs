//! # craftgen-storage
//!
//! Durable object storage and remote asset downloads.
//!
//! Two [`ObjectStore`] backends are provided: a local filesystem store whose
//! objects are served by the API under a public prefix, and an
//! S3-compatible store signed with SigV4. [`HttpFetcher`] streams
//! provider-hosted assets for transcoding.

pub mod fetcher;
pub mod filesystem;
pub mod keys;
pub mod s3;

use std::sync::Arc;

use tracing::info;

use craftgen_core::{Error, ObjectStore, Result};

pub use fetcher::HttpFetcher;
pub use filesystem::FilesystemStore;
pub use keys::{content_type_for, filename_from_url, object_key, sanitize_filename};
pub use s3::{S3Config, S3Store};

const DEFAULT_FILE_STORAGE_PATH: &str = "/var/lib/craftgen/objects";
const DEFAULT_STORAGE_PUBLIC_URL: &str = "http://localhost:3000/objects";

/// Which object store backs durable URLs.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    Filesystem {
        base_path: String,
        public_url: String,
    },
    S3(S3Config),
}

impl StorageConfig {
    /// Read `STORAGE_BACKEND` and the backend-specific variables.
    pub fn from_env() -> Result<Self> {
        let env = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
        match env("STORAGE_BACKEND", "filesystem").to_lowercase().as_str() {
            "filesystem" | "fs" => Ok(StorageConfig::Filesystem {
                base_path: env("FILE_STORAGE_PATH", DEFAULT_FILE_STORAGE_PATH),
                public_url: env("STORAGE_PUBLIC_URL", DEFAULT_STORAGE_PUBLIC_URL),
            }),
            "s3" => {
                let required = |key: &str| {
                    std::env::var(key)
                        .map_err(|_| Error::Config(format!("{} is required for the s3 backend", key)))
                };
                Ok(StorageConfig::S3(S3Config {
                    endpoint: env("S3_ENDPOINT", "http://localhost:9000"),
                    bucket: env("S3_BUCKET", "craftgen"),
                    region: env("S3_REGION", "us-east-1"),
                    access_key_id: required("S3_ACCESS_KEY_ID")?,
                    secret_access_key: required("S3_SECRET_ACCESS_KEY")?,
                }))
            }
            other => Err(Error::Config(format!("unknown STORAGE_BACKEND '{}'", other))),
        }
    }

    /// Build the configured store.
    pub fn build(&self, client: reqwest::Client) -> Arc<dyn ObjectStore> {
        match self {
            StorageConfig::Filesystem {
                base_path,
                public_url,
            } => {
                info!(subsystem = "storage", backend = "filesystem", base_path = %base_path, "Object store configured");
                Arc::new(FilesystemStore::new(base_path, public_url))
            }
            StorageConfig::S3(config) => {
                info!(subsystem = "storage", backend = "s3", endpoint = %config.endpoint, bucket = %config.bucket, "Object store configured");
                Arc::new(S3Store::new(config.clone(), client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_build() {
        let config = StorageConfig::Filesystem {
            base_path: "/tmp/craftgen-objects".to_string(),
            public_url: "http://localhost:3000/objects".to_string(),
        };
        let store = config.build(reqwest::Client::new());
        assert!(store.is_durable_url("http://localhost:3000/objects/a/b.png"));
    }
}
