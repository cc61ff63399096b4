//! # craftgen-db
//!
//! PostgreSQL database layer for craftgen.
//!
//! This crate provides:
//! - Connection pool management
//! - Chat session and message persistence with transactional turn handling
//! - Knowledge base catalog
//! - Vector similarity search with pgvector
//!
//! ## Example
//!
//! ```rust,ignore
//! use craftgen_db::{Database, PoolConfig};
//! use craftgen_core::ChatRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/craftgen", PoolConfig::default()).await?;
//!     let session = db.chat.create_session(1, "New chat", &[]).await?;
//!     println!("Created session: {}", session.id);
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod knowledge;
pub mod pool;

use std::sync::Arc;

use craftgen_core::{EmbeddingBackend, Result};

#[cfg(feature = "migrations")]
use craftgen_core::Error;

pub use chat::PgChatRepository;
pub use knowledge::{PgKnowledgeBaseCatalog, PgKnowledgeSearch};
pub use pool::{create_pool, log_pool_metrics, PoolConfig};

/// Database handle aggregating all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Chat sessions and messages.
    pub chat: PgChatRepository,
    /// Knowledge base names and question counters.
    pub knowledge_bases: PgKnowledgeBaseCatalog,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            chat: PgChatRepository::new(pool.clone()),
            knowledge_bases: PgKnowledgeBaseCatalog::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Similarity search using `embedder` for query vectors.
    pub fn knowledge_search(&self, embedder: Arc<dyn EmbeddingBackend>) -> PgKnowledgeSearch {
        PgKnowledgeSearch::new(self.pool.clone(), embedder)
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
