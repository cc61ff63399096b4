//! Design pipeline handlers.
//!
//! Every stage is synchronous: the response carries the finished concept,
//! durable image URL or analysis report.

use axum::extract::State;
use axum::Json;

use craftgen_core::{
    AnalysisReport, DesignConcept, DesignProject, GenerateDesignRequest, GenerationResult,
};

use crate::{ApiError, AppState};

fn require_concept(request: &GenerateDesignRequest) -> Result<&DesignConcept, ApiError> {
    request
        .concept
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("concept is required".to_string()))
}

/// Stage 1: generate a design concept from an idea.
///
/// POST /api/v1/generate/concept
#[utoipa::path(post, path = "/api/v1/generate/concept", tag = "Generate",
    request_body = GenerateDesignRequest,
    responses(
        (status = 200, description = "Concept generated", body = DesignProject),
        (status = 400, description = "Blank idea"),
        (status = 502, description = "Model output unusable")))]
pub async fn generate_concept(
    State(state): State<AppState>,
    Json(request): Json<GenerateDesignRequest>,
) -> Result<Json<DesignProject>, ApiError> {
    let project = state.pipeline.generate_concept(&request).await?;
    Ok(Json(project))
}

/// Combined generation entry point; behaves as the concept stage.
///
/// POST /api/v1/generate
#[utoipa::path(post, path = "/api/v1/generate", tag = "Generate",
    request_body = GenerateDesignRequest,
    responses((status = 200, description = "Concept generated", body = DesignProject)))]
pub async fn generate_design(
    state: State<AppState>,
    request: Json<GenerateDesignRequest>,
) -> Result<Json<DesignProject>, ApiError> {
    generate_concept(state, request).await
}

/// Stage 2: hand-drawn blueprint for a concept.
///
/// POST /api/v1/generate/blueprint
#[utoipa::path(post, path = "/api/v1/generate/blueprint", tag = "Generate",
    request_body = GenerateDesignRequest,
    responses(
        (status = 200, description = "Durable blueprint URL", body = GenerationResult),
        (status = 400, description = "Missing concept")))]
pub async fn generate_blueprint(
    State(state): State<AppState>,
    Json(request): Json<GenerateDesignRequest>,
) -> Result<Json<GenerationResult>, ApiError> {
    let concept = require_concept(&request)?;
    Ok(Json(state.pipeline.generate_blueprint(concept).await?))
}

/// Stage 3: photographic render conditioned on the blueprint.
///
/// POST /api/v1/generate/render
#[utoipa::path(post, path = "/api/v1/generate/render", tag = "Generate",
    request_body = GenerateDesignRequest,
    responses(
        (status = 200, description = "Durable render URL", body = GenerationResult),
        (status = 400, description = "Missing concept"),
        (status = 422, description = "Blueprint missing or not usable")))]
pub async fn generate_render(
    State(state): State<AppState>,
    Json(request): Json<GenerateDesignRequest>,
) -> Result<Json<GenerationResult>, ApiError> {
    let concept = require_concept(&request)?;
    let result = state
        .pipeline
        .generate_render(concept, request.blueprint_url.as_deref())
        .await?;
    Ok(Json(result))
}

/// Market, technical and risk analysis for a concept.
///
/// POST /api/v1/generate/analysis
#[utoipa::path(post, path = "/api/v1/generate/analysis", tag = "Generate",
    request_body = GenerateDesignRequest,
    responses((status = 200, description = "Analysis report", body = AnalysisReport)))]
pub async fn generate_analysis(
    State(state): State<AppState>,
    Json(request): Json<GenerateDesignRequest>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let concept = require_concept(&request)?;
    Ok(Json(state.analyzer.analyze(concept).await?))
}
