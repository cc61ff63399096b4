//! DashScope image generation backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use craftgen_core::defaults::IMAGE_SIZE;
use craftgen_core::{Error, GenerationRequest, ImageBackend, Result};

use super::types::*;

/// Default DashScope API endpoint (Beijing region).
pub const DEFAULT_DASHSCOPE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

/// Default timeout in seconds. Image generation is slow.
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

const GENERATION_PATH: &str = "/services/aigc/multimodal-generation/generation";

/// Configuration for the DashScope backend.
#[derive(Clone)]
pub struct DashScopeConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
    /// Output size, `"{width}*{height}"`.
    pub size: String,
}

impl std::fmt::Debug for DashScopeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashScopeConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("timeout_seconds", &self.timeout_seconds)
            .field("size", &self.size)
            .finish()
    }
}

impl DashScopeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_DASHSCOPE_URL.to_string(),
            api_key: api_key.into(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            size: IMAGE_SIZE.to_string(),
        }
    }

    /// Read `DASHSCOPE_*` variables. The API key is required.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("DASHSCOPE_API_KEY")
            .map_err(|_| Error::Config("DASHSCOPE_API_KEY is not set".to_string()))?;
        Ok(Self {
            base_url: std::env::var("DASHSCOPE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_DASHSCOPE_URL.to_string()),
            timeout_seconds: std::env::var("DASHSCOPE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ..Self::new(api_key)
        })
    }
}

/// Image backend speaking the DashScope multimodal generation API.
pub struct DashScopeBackend {
    client: Client,
    config: DashScopeConfig,
}

impl DashScopeBackend {
    pub fn new(config: DashScopeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "dashscope",
            base_url = %config.base_url,
            "Initializing DashScope image backend"
        );
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(DashScopeConfig::from_env()?)
    }

    /// Build the provider request for one resolved generation call.
    pub fn build_body(&self, model: &str, request: &GenerationRequest) -> MultimodalRequest {
        let mut content = vec![ContentItem::text(request.prompt())];
        let mut parameters = ImageParameters {
            size: self.config.size.clone(),
            n: 1,
            watermark: false,
            prompt_extend: true,
            negative_prompt: request.negative_prompt().to_string(),
            ..Default::default()
        };

        match request {
            GenerationRequest::TextToImage { .. } => {}
            GenerationRequest::TransferText { .. } => {
                parameters.enable_interleave = Some(true);
            }
            GenerationRequest::ImageToImage {
                reference,
                strength,
                transfer_mode,
                ..
            } => {
                content.push(ContentItem::image(reference.to_provider_value()));
                parameters.enable_interleave = Some(false);
                parameters.ref_strength = Some(*strength);
                parameters.ref_mode = Some(transfer_mode.as_str().to_string());
            }
        }

        MultimodalRequest {
            model: model.to_string(),
            input: MultimodalInput {
                messages: vec![MultimodalMessage {
                    role: "user".to_string(),
                    content,
                }],
            },
            parameters,
        }
    }
}

#[async_trait]
impl ImageBackend for DashScopeBackend {
    async fn generate_image(&self, model: &str, request: &GenerationRequest) -> Result<String> {
        let start = Instant::now();
        let body = self.build_body(model, request);
        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            GENERATION_PATH
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ImageGeneration(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let err: DashScopeErrorResponse =
                response.json().await.unwrap_or(DashScopeErrorResponse {
                    code: "unknown".to_string(),
                    message: "Unknown error".to_string(),
                    request_id: None,
                });
            warn!(
                model,
                status = %status,
                code = %err.code,
                request_id = ?err.request_id,
                "DashScope rejected image generation"
            );
            return Err(Error::ImageGeneration(format!(
                "DashScope returned {} ({}): {}",
                status, err.code, err.message
            )));
        }

        let result: MultimodalResponse = response
            .json()
            .await
            .map_err(|e| Error::ImageGeneration(format!("Failed to parse response: {}", e)))?;

        let image_url = result
            .first_image_url()
            .ok_or_else(|| {
                Error::ImageGeneration("response contains no image URL".to_string())
            })?
            .to_string();

        debug!(
            model,
            generation_kind = request.kind(),
            request_id = ?result.request_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "DashScope image generated"
        );
        Ok(image_url)
    }
}
