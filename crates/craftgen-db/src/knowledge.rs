//! Knowledge base catalog and pgvector similarity search.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument, trace};

use craftgen_core::{
    dedup_preserving_order, EmbeddingBackend, Error, KnowledgeBaseCatalog, KnowledgeBaseRef,
    Result, RetrievedChunk, SimilaritySearch,
};

/// PostgreSQL implementation of KnowledgeBaseCatalog.
#[derive(Clone)]
pub struct PgKnowledgeBaseCatalog {
    pool: Pool<Postgres>,
}

impl PgKnowledgeBaseCatalog {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create a knowledge base and return its id.
    pub async fn create(&self, name: &str) -> Result<i64> {
        sqlx::query_scalar("INSERT INTO knowledge_base (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    /// Questions recorded against a knowledge base.
    pub async fn question_count(&self, id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT question_count FROM knowledge_base WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("knowledge base {}", id)))
    }
}

#[async_trait]
impl KnowledgeBaseCatalog for PgKnowledgeBaseCatalog {
    async fn names(&self, ids: &[i64]) -> Result<Vec<KnowledgeBaseRef>> {
        let rows = sqlx::query("SELECT id, name FROM knowledge_base WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let found: Vec<KnowledgeBaseRef> = rows
            .iter()
            .map(|row| KnowledgeBaseRef {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect();

        Ok(ids
            .iter()
            .filter_map(|id| found.iter().find(|kb| kb.id == *id).cloned())
            .collect())
    }

    async fn record_questions(&self, ids: &[i64]) -> Result<()> {
        let ids = dedup_preserving_order(ids.iter().copied());
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let result = sqlx::query(
            "UPDATE knowledge_base SET question_count = question_count + 1 WHERE id = ANY($1)",
        )
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() != ids.len() as u64 {
            // Dropping the transaction rolls back the partial update.
            return Err(Error::NotFound(format!(
                "one or more knowledge bases in {:?}",
                ids
            )));
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}

/// pgvector-backed similarity search over `knowledge_chunk`.
///
/// Queries are embedded with the configured backend and ranked by cosine
/// distance.
#[derive(Clone)]
pub struct PgKnowledgeSearch {
    pool: Pool<Postgres>,
    embedder: Arc<dyn EmbeddingBackend>,
}

impl PgKnowledgeSearch {
    pub fn new(pool: Pool<Postgres>, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self { pool, embedder }
    }

    /// Store a chunk with a precomputed embedding. Returns the chunk id.
    pub async fn insert_chunk(
        &self,
        knowledge_base_id: i64,
        content: &str,
        embedding: Vector,
    ) -> Result<i64> {
        sqlx::query_scalar(
            "INSERT INTO knowledge_chunk (knowledge_base_id, content, embedding)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(knowledge_base_id)
        .bind(content)
        .bind(embedding)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Embed and store a chunk of text.
    pub async fn ingest_text(&self, knowledge_base_id: i64, content: &str) -> Result<i64> {
        let mut vectors = self
            .embedder
            .embed_texts(&[content.to_string()])
            .await?;
        let embedding = vectors
            .pop()
            .ok_or_else(|| Error::Embedding("backend returned no vector".to_string()))?;
        self.insert_chunk(knowledge_base_id, content, embedding).await
    }
}

#[async_trait]
impl SimilaritySearch for PgKnowledgeSearch {
    #[instrument(skip(self, query), fields(subsystem = "db", component = "knowledge_search", op = "similarity_search"))]
    async fn similarity_search(
        &self,
        query: &str,
        scope: Option<&[i64]>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if let Some(ids) = scope {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }

        let start = Instant::now();
        let query_vec = self
            .embedder
            .embed_texts(&[query.to_string()])
            .await
            .map_err(|e| Error::Retrieval(format!("query embedding failed: {}", e)))?
            .pop()
            .ok_or_else(|| Error::Retrieval("embedding backend returned no vector".to_string()))?;

        let scope_ids: Option<Vec<i64>> = scope.map(|ids| ids.to_vec());
        let rows = sqlx::query(
            "SELECT content, knowledge_base_id
             FROM knowledge_chunk
             WHERE ($2::bigint[] IS NULL OR knowledge_base_id = ANY($2))
             ORDER BY embedding <=> $1
             LIMIT $3",
        )
        .bind(query_vec)
        .bind(scope_ids)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Retrieval(format!("similarity query failed: {}", e)))?;

        let chunks: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| RetrievedChunk {
                text: row.get("content"),
                source_knowledge_base_id: row.get("knowledge_base_id"),
            })
            .collect();

        for chunk in &chunks {
            trace!(
                knowledge_base_id = chunk.source_knowledge_base_id,
                len = chunk.text.len(),
                "retrieved chunk"
            );
        }
        debug!(
            result_count = chunks.len(),
            scoped = scope.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Similarity search complete"
        );
        Ok(chunks)
    }
}
