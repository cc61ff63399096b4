//! Mock inference backends for deterministic testing.
//!
//! Each mock records its calls so tests can assert on prompts, selected
//! models and request variants.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use craftgen_inference::mock::MockGenerationBackend;
//! use craftgen_core::GenerationBackend;
//!
//! #[tokio::test]
//! async fn test_with_mock_backend() {
//!     let backend = MockGenerationBackend::new()
//!         .with_response_mapping("market", r#"{"segment": "tea lovers"}"#)
//!         .with_fixed_response("fallback");
//!
//!     assert_eq!(backend.generate("hello").await.unwrap(), "fallback");
//!     assert_eq!(backend.call_count(), 1);
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use craftgen_core::{
    EmbeddingBackend, Error, GenerationBackend, GenerationRequest, ImageBackend, Result, Vector,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// TEXT GENERATION
// =============================================================================

/// A recorded text generation call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
}

#[derive(Debug, Clone)]
struct MockConfig {
    default_response: String,
    /// `(needle, response)`; the first needle contained in the prompt wins.
    mappings: Vec<(String, String)>,
    failure: Option<String>,
    latency_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            default_response: "Mock response".to_string(),
            mappings: Vec::new(),
            failure: None,
            latency_ms: 0,
        }
    }
}

/// Mock text generation backend.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Response for prompts that match no mapping.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Respond with `output` whenever the prompt contains `needle`.
    pub fn with_response_mapping(
        mut self,
        needle: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .mappings
            .push((needle.into(), output.into()));
        self
    }

    /// Fail every call with `Error::Inference(message)`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failure = Some(message.into());
        self
    }

    /// Delay every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        lock(&self.call_log).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.call_log).len()
    }

    async fn respond(&self, system: &str, prompt: &str) -> Result<String> {
        lock(&self.call_log).push(MockCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
        });
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }
        if let Some(message) = &self.config.failure {
            return Err(Error::Inference(message.clone()));
        }
        Ok(self
            .config
            .mappings
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.config.default_response.clone()))
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.respond("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.respond(system, prompt).await
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

// =============================================================================
// IMAGE GENERATION
// =============================================================================

/// A recorded image generation call.
#[derive(Debug, Clone)]
pub struct MockImageCall {
    pub model: String,
    pub request: GenerationRequest,
}

/// Mock image backend returning short-lived looking provider URLs.
#[derive(Clone)]
pub struct MockImageBackend {
    url_base: String,
    failure: Option<String>,
    counter: Arc<AtomicUsize>,
    call_log: Arc<Mutex<Vec<MockImageCall>>>,
}

impl MockImageBackend {
    pub fn new() -> Self {
        Self {
            url_base: "https://dashscope-result.example.com/out".to_string(),
            failure: None,
            counter: Arc::new(AtomicUsize::new(0)),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve images from `url_base` (e.g. a wiremock server).
    pub fn with_url_base(mut self, url_base: impl Into<String>) -> Self {
        self.url_base = url_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Fail every call with `Error::ImageGeneration(message)`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn get_calls(&self) -> Vec<MockImageCall> {
        lock(&self.call_log).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.call_log).len()
    }
}

impl Default for MockImageBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageBackend for MockImageBackend {
    async fn generate_image(&self, model: &str, request: &GenerationRequest) -> Result<String> {
        lock(&self.call_log).push(MockImageCall {
            model: model.to_string(),
            request: request.clone(),
        });
        if let Some(message) = &self.failure {
            return Err(Error::ImageGeneration(message.clone()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}/{}.png?Expires=1700000000&Signature=abc", self.url_base, n))
    }
}

// =============================================================================
// EMBEDDINGS
// =============================================================================

/// Deterministic embeddings derived from character codes.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
}

impl MockEmbeddingBackend {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Same text always yields the same unit vector.
    pub fn embedding_for(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0f32; dimension.max(1)];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % vec.len();
            vec[idx] += 0.1;
        }
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
        vec
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        Ok(texts
            .iter()
            .map(|t| Vector::from(Self::embedding_for(t, self.dimension)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}
