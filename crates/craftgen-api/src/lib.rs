//! # craftgen-api
//!
//! HTTP API server for craftgen: the staged design pipeline (concept,
//! blueprint, render, analysis) and streamed knowledge chat.
//!
//! The binary in `main.rs` wires real backends from the environment; tests
//! build the same [`AppState`] from in-memory collaborators.

pub mod config;
pub mod error;
pub mod handlers;
pub mod services;

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use uuid::Uuid;

use craftgen_core::defaults::MAX_BODY_BYTES;
use craftgen_core::{
    AssetFetcher, ChatRepository, GenerationBackend, ImageBackend, KnowledgeBaseCatalog,
    ObjectStore, SimilaritySearch,
};
use craftgen_inference::{ImageStrategy, ImageStrategyConfig};

pub use config::AppConfig;
pub use error::ApiError;

use handlers::{chat, generate};
use services::{
    AssetTranscoder, ChatOrchestrator, ConceptSynthesizer, ContextRetriever, DesignAnalyzer,
    DesignPipeline, SessionService,
};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

/// External collaborators the services are built from.
#[derive(Clone)]
pub struct Backends {
    pub search: Arc<dyn SimilaritySearch>,
    pub generator: Arc<dyn GenerationBackend>,
    pub images: Arc<dyn ImageBackend>,
    pub store: Arc<dyn ObjectStore>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub chat: Arc<dyn ChatRepository>,
    pub catalog: Arc<dyn KnowledgeBaseCatalog>,
    pub image_config: ImageStrategyConfig,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DesignPipeline>,
    pub analyzer: Arc<DesignAnalyzer>,
    pub chat: Arc<ChatOrchestrator>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(backends: Backends) -> Self {
        let retriever = ContextRetriever::new(backends.search);
        let strategy = Arc::new(ImageStrategy::new(
            backends.images,
            backends.store.clone(),
            backends.image_config,
        ));
        let transcoder = AssetTranscoder::new(backends.fetcher, backends.store);

        Self {
            pipeline: Arc::new(DesignPipeline::new(
                retriever.clone(),
                ConceptSynthesizer::new(backends.generator.clone()),
                strategy,
                transcoder,
            )),
            analyzer: Arc::new(DesignAnalyzer::new(backends.generator.clone())),
            chat: Arc::new(ChatOrchestrator::new(
                backends.chat.clone(),
                backends.catalog.clone(),
                retriever,
                backends.generator,
            )),
            sessions: Arc::new(SessionService::new(backends.chat, backends.catalog)),
        }
    }
}

// =============================================================================
// OPENAPI
// =============================================================================

/// OpenAPI document served at `/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Craftgen API",
        description = "Culturally grounded product design generation and knowledge chat"
    ),
    paths(
        handlers::health_check,
        generate::generate_concept,
        generate::generate_design,
        generate::generate_blueprint,
        generate::generate_render,
        generate::generate_analysis,
        chat::create_session,
        chat::list_sessions,
        chat::get_session,
        chat::rename_session,
        chat::toggle_pin,
        chat::update_knowledge_bases,
        chat::delete_session,
        chat::stream_message,
    ),
    components(schemas(
        craftgen_core::Material,
        craftgen_core::ColorSwatch,
        craftgen_core::DesignConcept,
        craftgen_core::DesignProject,
        craftgen_core::ConversationTurn,
        craftgen_core::GenerateDesignRequest,
        craftgen_core::GenerationResult,
        craftgen_core::AnalysisReport,
        craftgen_core::KnowledgeBaseRef,
        craftgen_core::ChatSession,
        craftgen_core::MessageRole,
        craftgen_core::ChatMessage,
        craftgen_core::SessionDetail,
        craftgen_core::CreateSessionRequest,
        craftgen_core::RenameSessionRequest,
        craftgen_core::UpdateKnowledgeBasesRequest,
        craftgen_core::AskQuestionRequest,
    )),
    tags(
        (name = "Generate", description = "Staged design pipeline"),
        (name = "Chat", description = "Knowledge base chat"),
        (name = "System", description = "Operational endpoints"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the API router with tracing, request ids, CORS and a body limit.
pub fn build_router(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/openapi.json", get(openapi_json))
        // Design pipeline
        .route("/api/v1/generate", post(generate::generate_design))
        .route("/api/v1/generate/concept", post(generate::generate_concept))
        .route("/api/v1/generate/blueprint", post(generate::generate_blueprint))
        .route("/api/v1/generate/render", post(generate::generate_render))
        .route("/api/v1/generate/analysis", post(generate::generate_analysis))
        // Knowledge chat
        .route(
            "/api/v1/chat/sessions",
            post(chat::create_session).get(chat::list_sessions),
        )
        .route(
            "/api/v1/chat/sessions/:id",
            get(chat::get_session).delete(chat::delete_session),
        )
        .route("/api/v1/chat/sessions/:id/title", put(chat::rename_session))
        .route("/api/v1/chat/sessions/:id/pin", put(chat::toggle_pin))
        .route(
            "/api/v1/chat/sessions/:id/knowledge-bases",
            put(chat::update_knowledge_bases),
        )
        .route(
            "/api/v1/chat/sessions/:id/messages/stream",
            post(chat::stream_message),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static(handlers::USER_ID_HEADER),
                ])
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
