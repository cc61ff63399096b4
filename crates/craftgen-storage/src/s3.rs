//! S3-compatible object store (AWS S3, MinIO, R2).
//!
//! Requests are path-style (`{endpoint}/{bucket}/{key}`) and signed with
//! AWS Signature Version 4. Buffered bodies are signed over their SHA-256,
//! streamed bodies use `UNSIGNED-PAYLOAD` with an explicit `Content-Length`.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use craftgen_core::{Error, ObjectBody, ObjectStore, Result};

use crate::keys::encode_key;

type HmacSha256 = Hmac<Sha256>;

const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Connection settings for an S3-compatible endpoint.
#[derive(Clone, PartialEq)]
pub struct S3Config {
    /// Base endpoint, e.g. `http://localhost:9000`.
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[redacted]")
            .finish()
    }
}

/// S3 storage backend.
pub struct S3Store {
    config: S3Config,
    client: reqwest::Client,
    /// `{endpoint}/{bucket}`, the prefix of every durable URL.
    base_url: String,
    host: String,
}

/// Headers produced by signing a request.
#[derive(Debug, Clone, PartialEq)]
struct SignedRequest {
    authorization: String,
    amz_date: String,
    payload_hash: String,
}

impl S3Store {
    pub fn new(config: S3Config, client: reqwest::Client) -> Self {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let host = endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .to_string();
        let base_url = format!("{}/{}", endpoint, config.bucket);
        Self {
            config: S3Config { endpoint, ..config },
            client,
            base_url,
            host,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, encode_key(key))
    }

    fn canonical_uri(&self, key: &str) -> String {
        format!("/{}/{}", self.config.bucket, encode_key(key))
    }

    fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
    }

    fn sign(
        &self,
        method: &str,
        canonical_uri: &str,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<SignedRequest> {
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        // Header names are already in sorted order.
        let headers = [
            ("host", self.host.as_str()),
            ("x-amz-content-sha256", payload_hash),
            ("x-amz-date", amz_date.as_str()),
        ];
        let signed_headers = headers
            .iter()
            .map(|(k, _)| *k)
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method, canonical_uri, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.config.secret_access_key,
            &date_stamp,
            &self.config.region,
            "s3",
        )?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        Ok(SignedRequest {
            authorization: format!(
                "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
                self.config.access_key_id, credential_scope, signed_headers, signature
            ),
            amz_date,
            payload_hash: payload_hash.to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, key: &str, body: ObjectBody, content_type: &str) -> Result<String> {
        let start = Instant::now();
        let length = body.len();
        let (payload_hash, request_body) = match body {
            ObjectBody::Buffered(bytes) => (hex_sha256(&bytes), reqwest::Body::from(bytes)),
            ObjectBody::Streamed { stream, .. } => (
                UNSIGNED_PAYLOAD.to_string(),
                reqwest::Body::wrap_stream(stream),
            ),
        };

        let signed = self.sign("PUT", &self.canonical_uri(key), &payload_hash, Utc::now())?;
        let url = self.object_url(key);

        let resp = self
            .client
            .put(&url)
            .header("Authorization", &signed.authorization)
            .header("x-amz-content-sha256", &signed.payload_hash)
            .header("x-amz-date", &signed.amz_date)
            .header("Content-Type", content_type)
            .header("Content-Length", length)
            .body(request_body)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("PUT {} failed: {}", key, e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(object_key = %key, status = %status, "s3_store: PutObject rejected");
            return Err(Error::Storage(format!(
                "S3 PutObject failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        debug!(
            object_key = %key,
            size_bytes = length,
            duration_ms = start.elapsed().as_millis() as u64,
            "s3_store: stored"
        );
        Ok(url)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let encoded_key = self
            .key_for_url(url)
            .ok_or_else(|| Error::InvalidInput(format!("'{}' is not a stored object URL", url)))?;
        // The URL already carries the encoded key.
        let canonical_uri = format!("/{}/{}", self.config.bucket, encoded_key);
        let payload_hash = hex_sha256(b"");
        let signed = self.sign("GET", &canonical_uri, &payload_hash, Utc::now())?;

        let resp = self
            .client
            .get(url)
            .header("Authorization", &signed.authorization)
            .header("x-amz-content-sha256", &signed.payload_hash)
            .header("x-amz-date", &signed.amz_date)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("GET {} failed: {}", url, e)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("object '{}'", encoded_key)));
        }
        if !status.is_success() {
            return Err(Error::Storage(format!(
                "S3 GetObject failed (HTTP {}) for key '{}'",
                status, encoded_key
            )));
        }
        Ok(resp
            .bytes()
            .await
            .map_err(|e| Error::Storage(format!("reading {} failed: {}", url, e)))?
            .to_vec())
    }

    fn is_durable_url(&self, url: &str) -> bool {
        self.key_for_url(url).is_some()
    }
}

// ============ AWS SigV4 Helpers ============

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::Storage(format!("invalid HMAC key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the SigV4 signing key.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}
