//! Staged design pipeline: concept, blueprint, render.
//!
//! The server keeps no state between stages. The caller threads the concept
//! and the blueprint URL from one call to the next, and each stage validates
//! what it receives.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use craftgen_core::defaults::{BLUEPRINT_PREFIX, CONCEPT_TOP_K, REFERENCE_PREFIX, RENDER_PREFIX};
use craftgen_core::{
    DesignConcept, DesignProject, Error, GenerateDesignRequest, GenerationMode, GenerationResult,
    Result,
};
use craftgen_inference::ImageStrategy;

use super::prompts::{
    blueprint_prompt, render_prompt, BLUEPRINT_NEGATIVE_PROMPT, RENDER_NEGATIVE_PROMPT,
};
use super::{AssetTranscoder, ConceptSynthesizer, ContextRetriever};

/// Runs the three generation stages.
#[derive(Clone)]
pub struct DesignPipeline {
    retriever: ContextRetriever,
    synthesizer: ConceptSynthesizer,
    strategy: Arc<ImageStrategy>,
    transcoder: AssetTranscoder,
}

impl DesignPipeline {
    pub fn new(
        retriever: ContextRetriever,
        synthesizer: ConceptSynthesizer,
        strategy: Arc<ImageStrategy>,
        transcoder: AssetTranscoder,
    ) -> Self {
        Self {
            retriever,
            synthesizer,
            strategy,
            transcoder,
        }
    }

    pub fn transcoder(&self) -> &AssetTranscoder {
        &self.transcoder
    }

    /// Stage 1: idea (plus prior turns) to concept. No images are produced.
    #[instrument(
        skip(self, request),
        fields(subsystem = "pipeline", component = "controller", op = "concept", use_rag = request.use_rag)
    )]
    pub async fn generate_concept(&self, request: &GenerateDesignRequest) -> Result<DesignProject> {
        let start = Instant::now();
        let idea = request
            .idea
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .ok_or_else(|| Error::InvalidInput("idea must not be empty".to_string()))?;

        let context = if request.use_rag {
            self.retriever
                .retrieve_context(idea, None, CONCEPT_TOP_K)
                .await?
        } else {
            debug!("Retrieval disabled for this request");
            String::new()
        };

        let concept = self
            .synthesizer
            .synthesize(idea, &context, &request.chat_history)
            .await?;
        let project = DesignProject::from_concept(concept);

        info!(
            project_id = %project.id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Concept stage complete"
        );
        Ok(project)
    }

    /// Stage 2: concept to a durable hand-drawn blueprint.
    #[instrument(
        skip(self, concept),
        fields(subsystem = "pipeline", component = "controller", op = "blueprint")
    )]
    pub async fn generate_blueprint(&self, concept: &DesignConcept) -> Result<GenerationResult> {
        let start = Instant::now();
        let provider_url = self
            .strategy
            .generate(
                &blueprint_prompt(concept),
                Some(BLUEPRINT_NEGATIVE_PROMPT),
                None,
                GenerationMode::TextToImage,
            )
            .await;
        let image_url = self.transcoder.transcode(&provider_url, BLUEPRINT_PREFIX).await?;

        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Blueprint stage complete"
        );
        Ok(GenerationResult { image_url })
    }

    /// Stage 3: concept plus blueprint to a durable photographic render.
    ///
    /// A missing blueprint, or one that cannot be made durable, is
    /// `Precondition` and is rejected before any image provider call.
    #[instrument(
        skip(self, concept, blueprint_url),
        fields(subsystem = "pipeline", component = "controller", op = "render")
    )]
    pub async fn generate_render(
        &self,
        concept: &DesignConcept,
        blueprint_url: Option<&str>,
    ) -> Result<GenerationResult> {
        let start = Instant::now();
        let reference = self.durable_reference(blueprint_url).await?;

        let provider_url = self
            .strategy
            .generate(
                &render_prompt(concept),
                Some(RENDER_NEGATIVE_PROMPT),
                Some(&reference),
                GenerationMode::ImageToImage,
            )
            .await;
        let image_url = self.transcoder.transcode(&provider_url, RENDER_PREFIX).await?;

        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Render stage complete"
        );
        Ok(GenerationResult { image_url })
    }

    async fn durable_reference(&self, blueprint_url: Option<&str>) -> Result<String> {
        let url = blueprint_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Precondition("blueprintUrl is required".to_string()))?;

        if self.transcoder.is_durable(url) {
            debug!(durable = true, "Blueprint already durable");
            return Ok(url.to_string());
        }

        debug!(durable = false, "Transcoding caller-supplied blueprint");
        let durable = self
            .transcoder
            .transcode(url, REFERENCE_PREFIX)
            .await
            .map_err(|e| {
                warn!(error = %e, "Blueprint could not be made durable");
                Error::Precondition(format!("blueprintUrl is not usable: {}", e))
            })?;

        if !self.transcoder.is_durable(&durable) {
            return Err(Error::Precondition(
                "blueprintUrl is not a durable URL".to_string(),
            ));
        }
        Ok(durable)
    }
}
