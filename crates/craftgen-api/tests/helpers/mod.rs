//! In-memory collaborators for service and HTTP tests.
//!
//! Provides a chat repository, similarity search, knowledge base catalog and
//! asset fetcher that behave like the PostgreSQL and HTTP implementations
//! without external services.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;

use craftgen_api::{AppState, Backends};
use craftgen_core::{
    AssetFetcher, ChatMessage, ChatRepository, ChatSession, DesignConcept, Error, KnowledgeBaseCatalog,
    KnowledgeBaseRef, MessageRole, PreparedTurn, RemoteAsset, Result, RetrievedChunk,
    SimilaritySearch,
};
use craftgen_inference::mock::{MockGenerationBackend, MockImageBackend};
use craftgen_inference::ImageStrategyConfig;
use craftgen_storage::FilesystemStore;

/// Public prefix of the test object store.
pub const OBJECTS_URL: &str = "http://objects.test/objects";

pub const PNG_BYTES: [u8; 16] = [
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

pub const CONCEPT_JSON: &str = r##"```json
{
  "conceptName": "Bamboo Breeze Tea Set",
  "designPhilosophy": "Lightness and breath, after the bamboo groves of southern China",
  "culturalContext": "Song dynasty tea whisking ritual",
  "formFactor": "Low bamboo tray holding a teapot and four cups",
  "dimensions": "32 x 22 x 12 cm",
  "userInteraction": "Pour, share and stack the cups after use",
  "materials": [
    {"name": "Moso bamboo", "finish": "matte lacquer"},
    {"name": "Celadon porcelain", "finish": "crackle glaze"}
  ],
  "colors": [
    {"name": "Bamboo green", "hex": "#7BA05B"},
    {"name": "Ivory", "hex": "#FFFFF0"}
  ],
  "keyFeatures": ["Stackable cups", "Heat-safe tray"]
}
```"##;

/// The concept encoded by [`CONCEPT_JSON`].
pub fn sample_concept() -> DesignConcept {
    let json = craftgen_inference::extract_json_object(CONCEPT_JSON).expect("json object");
    serde_json::from_str(json).expect("concept")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn chunk(text: &str, kb: i64) -> RetrievedChunk {
    RetrievedChunk {
        text: text.to_string(),
        source_knowledge_base_id: kb,
    }
}

// =============================================================================
// CHAT REPOSITORY
// =============================================================================

#[derive(Default)]
struct RepoState {
    next_id: i64,
    sessions: HashMap<i64, ChatSession>,
    messages: Vec<ChatMessage>,
}

impl RepoState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Chat repository with the same semantics as the PostgreSQL one.
///
/// All writes hold one mutex, so concurrent `prepare_turn` calls are
/// serialized.
#[derive(Default)]
pub struct InMemoryChatRepository {
    state: Mutex<RepoState>,
    failing_completes: AtomicUsize,
    complete_attempts: AtomicUsize,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` `complete_message` calls fail with a
    /// database-like error.
    pub fn fail_completes(&self, count: usize) {
        self.failing_completes.store(count, Ordering::SeqCst);
    }

    pub fn complete_attempts(&self) -> usize {
        self.complete_attempts.load(Ordering::SeqCst)
    }

    pub fn message(&self, id: i64) -> Option<ChatMessage> {
        lock(&self.state).messages.iter().find(|m| m.id == id).cloned()
    }

    pub fn messages(&self, session_id: i64) -> Vec<ChatMessage> {
        let mut messages: Vec<_> = lock(&self.state)
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.order);
        messages
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn create_session(
        &self,
        user_id: i64,
        title: &str,
        knowledge_base_ids: &[i64],
    ) -> Result<ChatSession> {
        let mut state = lock(&self.state);
        let id = state.next_id();
        let now = Utc::now();
        let session = ChatSession {
            id,
            user_id,
            title: title.to_string(),
            knowledge_base_ids: knowledge_base_ids.to_vec(),
            message_count: 0,
            is_pinned: false,
            created_at: now,
            updated_at: now,
        };
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: i64) -> Result<Option<ChatSession>> {
        Ok(lock(&self.state).sessions.get(&session_id).cloned())
    }

    async fn list_sessions(&self, user_id: i64) -> Result<Vec<ChatSession>> {
        let mut sessions: Vec<_> = lock(&self.state)
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then(b.updated_at.cmp(&a.updated_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(sessions)
    }

    async fn rename_session(&self, session_id: i64, title: &str) -> Result<()> {
        let mut state = lock(&self.state);
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(Error::SessionNotFound(session_id))?;
        session.title = title.to_string();
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn toggle_pin(&self, session_id: i64) -> Result<bool> {
        let mut state = lock(&self.state);
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(Error::SessionNotFound(session_id))?;
        session.is_pinned = !session.is_pinned;
        Ok(session.is_pinned)
    }

    async fn set_knowledge_bases(&self, session_id: i64, knowledge_base_ids: &[i64]) -> Result<()> {
        let mut state = lock(&self.state);
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(Error::SessionNotFound(session_id))?;
        session.knowledge_base_ids = knowledge_base_ids.to_vec();
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_session(&self, session_id: i64) -> Result<()> {
        let mut state = lock(&self.state);
        state
            .sessions
            .remove(&session_id)
            .ok_or(Error::SessionNotFound(session_id))?;
        state.messages.retain(|m| m.session_id != session_id);
        Ok(())
    }

    async fn prepare_turn(
        &self,
        user_id: i64,
        session_id: i64,
        question: &str,
    ) -> Result<PreparedTurn> {
        let mut state = lock(&self.state);
        let session = state
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or(Error::SessionNotFound(session_id))?;
        if session.user_id != user_id {
            return Err(Error::Forbidden(format!(
                "session {} belongs to another user",
                session_id
            )));
        }

        let order = session.message_count;
        let now = Utc::now();
        let user_message_id = state.next_id();
        let assistant_message_id = state.next_id();
        state.messages.push(ChatMessage {
            id: user_message_id,
            session_id,
            role: MessageRole::User,
            content: question.to_string(),
            order,
            completed: true,
            source_knowledge_base_ids: Vec::new(),
            created_at: now,
        });
        state.messages.push(ChatMessage {
            id: assistant_message_id,
            session_id,
            role: MessageRole::Assistant,
            content: String::new(),
            order: order + 1,
            completed: false,
            source_knowledge_base_ids: Vec::new(),
            created_at: now,
        });

        let stored = state
            .sessions
            .get_mut(&session_id)
            .ok_or(Error::SessionNotFound(session_id))?;
        stored.message_count += 2;
        stored.updated_at = now;

        Ok(PreparedTurn {
            session: stored.clone(),
            user_message_id,
            assistant_message_id,
        })
    }

    async fn complete_message(
        &self,
        message_id: i64,
        content: &str,
        source_ids: &[i64],
    ) -> Result<()> {
        self.complete_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_completes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(Error::Internal("connection reset during commit".to_string()));
        }

        let mut state = lock(&self.state);
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| Error::NotFound(format!("message {}", message_id)))?;
        if message.completed {
            return Err(Error::Conflict(format!(
                "message {} is already completed",
                message_id
            )));
        }
        message.content = content.to_string();
        message.completed = true;
        message.source_knowledge_base_ids = source_ids.to_vec();
        Ok(())
    }

    async fn list_messages(&self, session_id: i64) -> Result<Vec<ChatMessage>> {
        Ok(self.messages(session_id))
    }
}

// =============================================================================
// SIMILARITY SEARCH
// =============================================================================

/// Returns the configured chunks in order, filtered by scope.
#[derive(Default)]
pub struct InMemorySearch {
    chunks: Vec<RetrievedChunk>,
    latency: Option<Duration>,
    failure: Option<String>,
    queries: Mutex<Vec<(String, Option<Vec<i64>>, usize)>>,
}

impl InMemorySearch {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            chunks,
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Recorded `(query, scope, top_k)` triples.
    pub fn queries(&self) -> Vec<(String, Option<Vec<i64>>, usize)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl SimilaritySearch for InMemorySearch {
    async fn similarity_search(
        &self,
        query: &str,
        scope: Option<&[i64]>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        lock(&self.queries).push((query.to_string(), scope.map(|s| s.to_vec()), top_k));
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(message) = &self.failure {
            return Err(Error::Embedding(message.clone()));
        }
        Ok(self
            .chunks
            .iter()
            .filter(|c| scope.map_or(true, |s| s.contains(&c.source_knowledge_base_id)))
            .take(top_k)
            .cloned()
            .collect())
    }
}

// =============================================================================
// KNOWLEDGE BASE CATALOG
// =============================================================================

/// Named knowledge bases with question counters.
#[derive(Default)]
pub struct InMemoryCatalog {
    names: HashMap<i64, String>,
    questions: Mutex<HashMap<i64, i64>>,
}

impl InMemoryCatalog {
    pub fn new(entries: &[(i64, &str)]) -> Self {
        Self {
            names: entries
                .iter()
                .map(|(id, name)| (*id, name.to_string()))
                .collect(),
            questions: Mutex::new(HashMap::new()),
        }
    }

    pub fn question_count(&self, id: i64) -> i64 {
        lock(&self.questions).get(&id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl KnowledgeBaseCatalog for InMemoryCatalog {
    async fn names(&self, ids: &[i64]) -> Result<Vec<KnowledgeBaseRef>> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.names.get(id).map(|name| KnowledgeBaseRef {
                    id: *id,
                    name: name.clone(),
                })
            })
            .collect())
    }

    async fn record_questions(&self, ids: &[i64]) -> Result<()> {
        if let Some(unknown) = ids.iter().find(|id| !self.names.contains_key(id)) {
            return Err(Error::NotFound(format!("knowledge base {}", unknown)));
        }
        let mut questions = lock(&self.questions);
        for id in ids {
            *questions.entry(*id).or_insert(0) += 1;
        }
        Ok(())
    }
}

// =============================================================================
// ASSET FETCHER
// =============================================================================

/// Serves a small PNG for every URL except those marked unreachable.
#[derive(Default)]
pub struct StaticFetcher {
    unreachable: Vec<String>,
    advertise_length: bool,
    opened: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self {
            advertise_length: true,
            ..Default::default()
        }
    }

    /// Fail downloads of URLs containing `needle` with HTTP 403.
    pub fn with_unreachable(mut self, needle: &str) -> Self {
        self.unreachable.push(needle.to_string());
        self
    }

    /// Omit `Content-Length`, as chunked responses do.
    pub fn without_length(mut self) -> Self {
        self.advertise_length = false;
        self
    }

    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }
}

#[async_trait]
impl AssetFetcher for StaticFetcher {
    async fn open(&self, url: &str) -> Result<RemoteAsset> {
        lock(&self.opened).push(url.to_string());
        if self.unreachable.iter().any(|n| url.contains(n.as_str())) {
            return Err(Error::Request(format!("GET {} returned HTTP 403 Forbidden", url)));
        }
        let (head, tail) = PNG_BYTES.split_at(8);
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ];
        Ok(RemoteAsset {
            content_length: self.advertise_length.then_some(PNG_BYTES.len() as u64),
            content_type: Some("image/png".to_string()),
            body: Box::pin(stream::iter(chunks)),
        })
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// Everything a test needs to drive the services and inspect side effects.
pub struct Harness {
    pub state: AppState,
    pub generator: MockGenerationBackend,
    pub images: MockImageBackend,
    pub search: Arc<InMemorySearch>,
    pub fetcher: Arc<StaticFetcher>,
    pub store: Arc<FilesystemStore>,
    pub repo: Arc<InMemoryChatRepository>,
    pub catalog: Arc<InMemoryCatalog>,
    pub objects_dir: tempfile::TempDir,
}

pub struct HarnessBuilder {
    generator: MockGenerationBackend,
    images: MockImageBackend,
    search: InMemorySearch,
    fetcher: StaticFetcher,
    catalog: InMemoryCatalog,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            generator: MockGenerationBackend::new().with_fixed_response(CONCEPT_JSON),
            images: MockImageBackend::new(),
            search: InMemorySearch::new(Vec::new()),
            fetcher: StaticFetcher::new(),
            catalog: InMemoryCatalog::new(&[
                (5, "Bamboo weaving"),
                (7, "Celadon kilns"),
                (9, "Silk"),
                (11, "Lacquer"),
            ]),
        }
    }
}

impl HarnessBuilder {
    pub fn generator(mut self, generator: MockGenerationBackend) -> Self {
        self.generator = generator;
        self
    }

    pub fn images(mut self, images: MockImageBackend) -> Self {
        self.images = images;
        self
    }

    pub fn search(mut self, search: InMemorySearch) -> Self {
        self.search = search;
        self
    }

    pub fn fetcher(mut self, fetcher: StaticFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn build(self) -> Harness {
        let objects_dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(FilesystemStore::new(objects_dir.path(), OBJECTS_URL));
        let search = Arc::new(self.search);
        let fetcher = Arc::new(self.fetcher);
        let repo = Arc::new(InMemoryChatRepository::new());
        let catalog = Arc::new(self.catalog);

        let state = AppState::new(Backends {
            search: search.clone(),
            generator: Arc::new(self.generator.clone()),
            images: Arc::new(self.images.clone()),
            store: store.clone(),
            fetcher: fetcher.clone(),
            chat: repo.clone(),
            catalog: catalog.clone(),
            image_config: ImageStrategyConfig::default(),
        });

        Harness {
            state,
            generator: self.generator,
            images: self.images,
            search,
            fetcher,
            store,
            repo,
            catalog,
            objects_dir,
        }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder::default()
}

impl Harness {
    /// Path on disk of a durable URL produced by the test store.
    pub fn object_path(&self, url: &str) -> std::path::PathBuf {
        let key = url
            .strip_prefix(&format!("{}/", OBJECTS_URL))
            .expect("durable url");
        self.objects_dir.path().join(key)
    }
}
