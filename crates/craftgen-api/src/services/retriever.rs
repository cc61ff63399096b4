//! Context retrieval over the knowledge corpus.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, trace};

use craftgen_core::defaults::{CONTEXT_SEPARATOR, NO_CONTEXT_SENTINEL};
use craftgen_core::{Error, Result, RetrievedChunk, SimilaritySearch};

/// Wraps similarity search with the prompt-context policy.
#[derive(Clone)]
pub struct ContextRetriever {
    search: Arc<dyn SimilaritySearch>,
}

impl ContextRetriever {
    pub fn new(search: Arc<dyn SimilaritySearch>) -> Self {
        Self { search }
    }

    /// Top `top_k` chunks, most similar first.
    ///
    /// An empty result is not an error. Search failures are `Retrieval`.
    #[instrument(
        skip(self, query),
        fields(subsystem = "pipeline", component = "retriever", op = "retrieve")
    )]
    pub async fn retrieve(
        &self,
        query: &str,
        scope: Option<&[i64]>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let start = Instant::now();
        let chunks = self
            .search
            .similarity_search(query, scope, top_k)
            .await
            .map_err(|e| match e {
                Error::Retrieval(_) => e,
                other => Error::Retrieval(other.to_string()),
            })?;

        for chunk in &chunks {
            trace!(
                source_knowledge_base_id = chunk.source_knowledge_base_id,
                chunk_len = chunk.text.len(),
                "Retrieved chunk"
            );
        }
        debug!(
            result_count = chunks.len(),
            scoped = scope.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Retrieval complete"
        );
        Ok(chunks)
    }

    /// Chunks joined into a prompt context, or the fixed sentinel when
    /// nothing was found.
    pub async fn retrieve_context(
        &self,
        query: &str,
        scope: Option<&[i64]>,
        top_k: usize,
    ) -> Result<String> {
        let chunks = self.retrieve(query, scope, top_k).await?;
        Ok(join_context(&chunks).unwrap_or_else(|| NO_CONTEXT_SENTINEL.to_string()))
    }
}

/// Join chunk texts with the context separator. `None` when empty.
pub fn join_context(chunks: &[RetrievedChunk]) -> Option<String> {
    if chunks.is_empty() {
        return None;
    }
    Some(
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR),
    )
}
