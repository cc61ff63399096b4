//! Image generation strategy.
//!
//! Resolves a pipeline stage's `(prompt, negative prompt, reference, mode)`
//! into one [`GenerationRequest`] and the model to run it on, then calls the
//! image backend. Provider failures never escape: the caller receives
//! [`PLACEHOLDER_IMAGE_URL`] instead.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use craftgen_core::defaults::{
    DEFAULT_NEGATIVE_PROMPT, IMAGE_TEXT_MODEL, IMAGE_TRANSFER_MODEL, PLACEHOLDER_IMAGE_URL,
    REFERENCE_STRENGTH, REFERENCE_STRENGTH_MAX, REFERENCE_STRENGTH_MIN,
};
use craftgen_core::{
    GenerationMode, GenerationRequest, ImageBackend, ObjectStore, ReferenceImage, TransferMode,
};

/// Model and strength policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStrategyConfig {
    /// General-purpose text-to-image model.
    pub text_model: String,
    /// Transfer-capable model used for image-to-image.
    pub transfer_model: String,
    /// Reference conditioning strength (clamped on use).
    pub reference_strength: f32,
}

impl Default for ImageStrategyConfig {
    fn default() -> Self {
        Self {
            text_model: IMAGE_TEXT_MODEL.to_string(),
            transfer_model: IMAGE_TRANSFER_MODEL.to_string(),
            reference_strength: REFERENCE_STRENGTH,
        }
    }
}

impl ImageStrategyConfig {
    /// Read `IMAGE_TEXT_MODEL`, `IMAGE_TRANSFER_MODEL` and
    /// `IMAGE_REFERENCE_STRENGTH`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            text_model: std::env::var("IMAGE_TEXT_MODEL").unwrap_or(defaults.text_model),
            transfer_model: std::env::var("IMAGE_TRANSFER_MODEL")
                .unwrap_or(defaults.transfer_model),
            reference_strength: std::env::var("IMAGE_REFERENCE_STRENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reference_strength),
        }
    }
}

/// Clamp a conditioning strength into the supported range.
pub fn clamp_strength(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(REFERENCE_STRENGTH_MIN, REFERENCE_STRENGTH_MAX)
    } else {
        REFERENCE_STRENGTH
    }
}

/// Chooses a model and parameter set, then generates one image.
pub struct ImageStrategy {
    backend: Arc<dyn ImageBackend>,
    store: Arc<dyn ObjectStore>,
    config: ImageStrategyConfig,
}

impl ImageStrategy {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        store: Arc<dyn ObjectStore>,
        config: ImageStrategyConfig,
    ) -> Self {
        Self {
            backend,
            store,
            config,
        }
    }

    pub fn config(&self) -> &ImageStrategyConfig {
        &self.config
    }

    /// Resolve the model and request for one call.
    ///
    /// `ImageToImage` without a usable reference falls back to the transfer
    /// model's interleaved text-to-image mode, so reference parameters are
    /// never sent without a reference.
    pub async fn resolve(
        &self,
        prompt: &str,
        negative_prompt: Option<&str>,
        reference_url: Option<&str>,
        mode: GenerationMode,
    ) -> (String, GenerationRequest) {
        let prompt = prompt.to_string();
        let negative_prompt = negative_prompt
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_NEGATIVE_PROMPT)
            .to_string();
        let reference_url = reference_url.map(str::trim).filter(|u| !u.is_empty());

        match (mode, reference_url) {
            (GenerationMode::TextToImage, _) => (
                self.config.text_model.clone(),
                GenerationRequest::TextToImage {
                    prompt,
                    negative_prompt,
                },
            ),
            (GenerationMode::ImageToImage, None) => {
                debug!("image-to-image requested without reference, using interleaved text mode");
                (
                    self.config.transfer_model.clone(),
                    GenerationRequest::TransferText {
                        prompt,
                        negative_prompt,
                    },
                )
            }
            (GenerationMode::ImageToImage, Some(url)) => (
                self.config.transfer_model.clone(),
                GenerationRequest::ImageToImage {
                    prompt,
                    negative_prompt,
                    reference: self.load_reference(url).await,
                    strength: clamp_strength(self.config.reference_strength),
                    transfer_mode: TransferMode::Repaint,
                },
            ),
        }
    }

    /// Inline our own objects as bytes; pass anything else through as a URL.
    async fn load_reference(&self, url: &str) -> ReferenceImage {
        if !self.store.is_durable_url(url) {
            debug!(durable = false, "passing reference URL through");
            return ReferenceImage::Url(url.to_string());
        }
        match self.store.fetch_bytes(url).await {
            Ok(bytes) => {
                let mime = infer::get(&bytes)
                    .map(|kind| kind.mime_type())
                    .unwrap_or("image/png")
                    .to_string();
                debug!(durable = true, size_bytes = bytes.len(), mime = %mime, "reference inlined");
                ReferenceImage::Inline { bytes, mime }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = "url",
                    "Reference fetch failed, passing original URL to provider"
                );
                ReferenceImage::Url(url.to_string())
            }
        }
    }

    /// Generate one image and return the provider URL, or the placeholder
    /// URL if the provider call fails.
    #[instrument(
        skip(self, prompt, negative_prompt, reference_url),
        fields(subsystem = "inference", component = "image_strategy", op = "generate")
    )]
    pub async fn generate(
        &self,
        prompt: &str,
        negative_prompt: Option<&str>,
        reference_url: Option<&str>,
        mode: GenerationMode,
    ) -> String {
        let start = Instant::now();
        let (model, request) = self
            .resolve(prompt, negative_prompt, reference_url, mode)
            .await;
        debug!(
            model = %model,
            generation_kind = request.kind(),
            prompt_len = prompt.len(),
            "Image model selected"
        );

        match self.backend.generate_image(&model, &request).await {
            Ok(url) => {
                info!(
                    model = %model,
                    generation_kind = request.kind(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Image generated"
                );
                url
            }
            Err(e) => {
                warn!(
                    model = %model,
                    generation_kind = request.kind(),
                    error = %e,
                    fallback = "placeholder",
                    "Image generation failed, substituting placeholder"
                );
                PLACEHOLDER_IMAGE_URL.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockImageBackend;
    use async_trait::async_trait;
    use craftgen_core::{Error, ObjectBody, Result};

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    /// Store whose objects live under `https://objects.test/`.
    struct FixedStore {
        bytes: Option<Vec<u8>>,
    }

    #[async_trait]
    impl ObjectStore for FixedStore {
        async fn put_object(&self, key: &str, _body: ObjectBody, _ct: &str) -> Result<String> {
            Ok(format!("https://objects.test/{}", key))
        }

        async fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>> {
            self.bytes
                .clone()
                .ok_or_else(|| Error::Storage("unreachable".to_string()))
        }

        fn is_durable_url(&self, url: &str) -> bool {
            url.starts_with("https://objects.test/")
        }
    }

    fn strategy(backend: MockImageBackend, bytes: Option<Vec<u8>>) -> ImageStrategy {
        ImageStrategy::new(
            Arc::new(backend),
            Arc::new(FixedStore { bytes }),
            ImageStrategyConfig::default(),
        )
    }

    #[test]
    fn test_clamp_strength() {
        assert_eq!(clamp_strength(0.6), 0.6);
        assert_eq!(clamp_strength(0.1), REFERENCE_STRENGTH_MIN);
        assert_eq!(clamp_strength(0.95), REFERENCE_STRENGTH_MAX);
        assert_eq!(clamp_strength(f32::NAN), REFERENCE_STRENGTH);
    }

    #[tokio::test]
    async fn test_text_to_image_uses_text_model_and_default_negative() {
        let backend = MockImageBackend::new();
        let strategy = strategy(backend.clone(), None);

        let url = strategy
            .generate("sketch", None, Some("https://ignored.example.com/a.png"), GenerationMode::TextToImage)
            .await;
        assert_ne!(url, PLACEHOLDER_IMAGE_URL);

        let calls = backend.get_calls();
        assert_eq!(calls[0].model, IMAGE_TEXT_MODEL);
        assert_eq!(calls[0].request.negative_prompt(), DEFAULT_NEGATIVE_PROMPT);
        assert!(matches!(calls[0].request, GenerationRequest::TextToImage { .. }));
    }

    #[tokio::test]
    async fn test_image_to_image_without_reference_never_sets_reference_params() {
        let backend = MockImageBackend::new();
        let strategy = strategy(backend.clone(), None);

        for reference in [None, Some(""), Some("   ")] {
            strategy
                .generate("render", Some("cartoon"), reference, GenerationMode::ImageToImage)
                .await;
        }
        for call in backend.get_calls() {
            assert_eq!(call.model, IMAGE_TRANSFER_MODEL);
            assert!(matches!(call.request, GenerationRequest::TransferText { .. }));
            assert!(call.request.reference().is_none());
            assert_eq!(call.request.negative_prompt(), "cartoon");
        }
    }

    #[tokio::test]
    async fn test_durable_reference_is_inlined() {
        let backend = MockImageBackend::new();
        let strategy = strategy(backend.clone(), Some(PNG_MAGIC.to_vec()));

        strategy
            .generate(
                "render",
                None,
                Some("https://objects.test/design-blueprints/a.png"),
                GenerationMode::ImageToImage,
            )
            .await;

        match &backend.get_calls()[0].request {
            GenerationRequest::ImageToImage {
                reference,
                strength,
                transfer_mode,
                ..
            } => {
                assert_eq!(
                    reference,
                    &ReferenceImage::Inline {
                        bytes: PNG_MAGIC.to_vec(),
                        mime: "image/png".to_string()
                    }
                );
                assert_eq!(*strength, REFERENCE_STRENGTH);
                assert_eq!(*transfer_mode, TransferMode::Repaint);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reference_fetch_failure_falls_back_to_url() {
        let backend = MockImageBackend::new();
        let strategy = strategy(backend.clone(), None);
        let url = "https://objects.test/design-blueprints/a.png";

        strategy
            .generate("render", None, Some(url), GenerationMode::ImageToImage)
            .await;

        let call = &backend.get_calls()[0];
        assert_eq!(
            call.request.reference(),
            Some(&ReferenceImage::Url(url.to_string()))
        );
    }

    #[tokio::test]
    async fn test_foreign_reference_passes_through() {
        let backend = MockImageBackend::new();
        let strategy = strategy(backend.clone(), Some(PNG_MAGIC.to_vec()));
        let url = "https://dashscope-result.example.com/x.png?Expires=1";

        strategy
            .generate("render", None, Some(url), GenerationMode::ImageToImage)
            .await;
        assert_eq!(
            backend.get_calls()[0].request.reference(),
            Some(&ReferenceImage::Url(url.to_string()))
        );
    }

    #[tokio::test]
    async fn test_provider_failure_yields_placeholder() {
        let backend = MockImageBackend::new().with_failure("quota exceeded");
        let strategy = strategy(backend.clone(), None);

        let url = strategy
            .generate("sketch", None, None, GenerationMode::TextToImage)
            .await;
        assert_eq!(url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_configured_strength_is_clamped() {
        let backend = MockImageBackend::new();
        let strategy = ImageStrategy::new(
            Arc::new(backend.clone()),
            Arc::new(FixedStore { bytes: None }),
            ImageStrategyConfig {
                reference_strength: 0.9,
                ..Default::default()
            },
        );
        let (_, request) = strategy
            .resolve("p", None, Some("https://x.example.com/a.png"), GenerationMode::ImageToImage)
            .await;
        match request {
            GenerationRequest::ImageToImage { strength, .. } => {
                assert_eq!(strength, REFERENCE_STRENGTH_MAX)
            }
            other => panic!("unexpected request {:?}", other),
        }
    }
}
