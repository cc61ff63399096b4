//! Core traits for craftgen collaborators.
//!
//! The generation services depend only on these traits, which keeps the
//! providers, the database and object storage pluggable and testable.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::Result;
use crate::image::GenerationRequest;
use crate::models::*;

// =============================================================================
// RETRIEVAL TRAITS
// =============================================================================

/// Vector similarity search over ingested knowledge chunks.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Return up to `top_k` chunks ordered by descending similarity.
    ///
    /// When `scope` is `Some`, only chunks whose knowledge base is in the
    /// slice are considered (an empty slice matches nothing).
    async fn similarity_search(
        &self,
        query: &str,
        scope: Option<&[i64]>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>>;
}

/// Knowledge base metadata used by the chat orchestrator.
#[async_trait]
pub trait KnowledgeBaseCatalog: Send + Sync {
    /// Names for the given ids, in the order given. Unknown ids are omitted.
    async fn names(&self, ids: &[i64]) -> Result<Vec<KnowledgeBaseRef>>;

    /// Count one question against each knowledge base.
    ///
    /// Fails with `NotFound` if any id is unknown.
    async fn record_questions(&self, ids: &[i64]) -> Result<()>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<crate::Vector>>;

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for image generation.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Run one generation and return the provider-hosted image URL.
    ///
    /// Provider URLs are short-lived; callers must transcode them.
    async fn generate_image(&self, model: &str, request: &GenerationRequest) -> Result<String>;
}

// =============================================================================
// STORAGE TRAITS
// =============================================================================

/// Stream of body bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Body handed to [`ObjectStore::put_object`].
pub enum ObjectBody {
    /// Fully buffered bytes.
    Buffered(Bytes),
    /// A stream with a known total length.
    Streamed { stream: ByteStream, length: u64 },
}

impl ObjectBody {
    /// Total length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            ObjectBody::Buffered(bytes) => bytes.len() as u64,
            ObjectBody::Streamed { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectBody::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
            ObjectBody::Streamed { length, .. } => write!(f, "Streamed({} bytes)", length),
        }
    }
}

/// Durable object storage owned by this system.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object and return its durable URL.
    async fn put_object(&self, key: &str, body: ObjectBody, content_type: &str)
        -> Result<String>;

    /// Read back an object addressed by one of our durable URLs.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Whether `url` points into this store.
    fn is_durable_url(&self, url: &str) -> bool;
}

/// An opened remote download.
pub struct RemoteAsset {
    /// Advertised `Content-Length`, if any.
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

/// Opens remote URLs for streaming download.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Start a download; fails on transport errors and non-success statuses.
    async fn open(&self, url: &str) -> Result<RemoteAsset>;
}

// =============================================================================
// CHAT TRAITS
// =============================================================================

/// Persistence for chat sessions and messages.
///
/// Ownership checks other than in [`ChatRepository::prepare_turn`] are the
/// caller's job.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Create a session for `user_id`.
    async fn create_session(
        &self,
        user_id: i64,
        title: &str,
        knowledge_base_ids: &[i64],
    ) -> Result<ChatSession>;

    /// Fetch a session by id.
    async fn get_session(&self, session_id: i64) -> Result<Option<ChatSession>>;

    /// Sessions owned by `user_id`, pinned first, then most recently updated.
    async fn list_sessions(&self, user_id: i64) -> Result<Vec<ChatSession>>;

    async fn rename_session(&self, session_id: i64, title: &str) -> Result<()>;

    /// Flip the pinned flag and return the new value.
    async fn toggle_pin(&self, session_id: i64) -> Result<bool>;

    async fn set_knowledge_bases(&self, session_id: i64, knowledge_base_ids: &[i64])
        -> Result<()>;

    /// Delete a session and its messages.
    async fn delete_session(&self, session_id: i64) -> Result<()>;

    /// Atomically persist a completed USER message and an incomplete
    /// ASSISTANT placeholder, advancing the message counter by two.
    ///
    /// Concurrent calls on one session are serialized.
    async fn prepare_turn(
        &self,
        user_id: i64,
        session_id: i64,
        question: &str,
    ) -> Result<PreparedTurn>;

    /// Finalize an ASSISTANT placeholder. Fails with `Conflict` if the
    /// message was already completed and `NotFound` if it does not exist.
    async fn complete_message(
        &self,
        message_id: i64,
        content: &str,
        source_ids: &[i64],
    ) -> Result<()>;

    /// Messages of a session ordered by `order`.
    async fn list_messages(&self, session_id: i64) -> Result<Vec<ChatMessage>>;
}
