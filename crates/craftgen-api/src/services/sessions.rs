//! Chat session management with ownership checks.

use std::sync::Arc;

use tracing::{info, instrument};

use craftgen_core::defaults::DEFAULT_SESSION_TITLE;
use craftgen_core::{
    dedup_preserving_order, ChatRepository, ChatSession, CreateSessionRequest, Error,
    KnowledgeBaseCatalog, Result, SessionDetail,
};

/// Session CRUD for one user's chats.
#[derive(Clone)]
pub struct SessionService {
    repo: Arc<dyn ChatRepository>,
    catalog: Arc<dyn KnowledgeBaseCatalog>,
}

impl SessionService {
    pub fn new(repo: Arc<dyn ChatRepository>, catalog: Arc<dyn KnowledgeBaseCatalog>) -> Self {
        Self { repo, catalog }
    }

    /// Fetch a session, requiring `user_id` to own it.
    pub async fn owned_session(&self, user_id: i64, session_id: i64) -> Result<ChatSession> {
        let session = self
            .repo
            .get_session(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;
        if session.user_id != user_id {
            return Err(Error::Forbidden(format!(
                "session {} belongs to another user",
                session_id
            )));
        }
        Ok(session)
    }

    #[instrument(skip(self, request), fields(subsystem = "chat", component = "sessions", op = "create"))]
    pub async fn create_session(
        &self,
        user_id: i64,
        request: CreateSessionRequest,
    ) -> Result<ChatSession> {
        let ids = dedup_preserving_order(request.knowledge_base_ids);
        let title = match request.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => self.default_title(&ids).await?,
        };
        let session = self.repo.create_session(user_id, &title, &ids).await?;
        info!(session_id = session.id, knowledge_bases = ids.len(), "Chat session created");
        Ok(session)
    }

    async fn default_title(&self, ids: &[i64]) -> Result<String> {
        Ok(match ids {
            [] => DEFAULT_SESSION_TITLE.to_string(),
            [id] => self
                .catalog
                .names(&[*id])
                .await?
                .into_iter()
                .next()
                .map(|kb| kb.name)
                .unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_string()),
            many => format!("{} knowledge bases chat", many.len()),
        })
    }

    pub async fn list_sessions(&self, user_id: i64) -> Result<Vec<ChatSession>> {
        self.repo.list_sessions(user_id).await
    }

    pub async fn session_detail(&self, user_id: i64, session_id: i64) -> Result<SessionDetail> {
        let session = self.owned_session(user_id, session_id).await?;
        let messages = self.repo.list_messages(session_id).await?;
        Ok(SessionDetail { session, messages })
    }

    pub async fn rename_session(&self, user_id: i64, session_id: i64, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("title must not be empty".to_string()));
        }
        self.owned_session(user_id, session_id).await?;
        self.repo.rename_session(session_id, title).await
    }

    /// Flip the pinned flag and return the new value.
    pub async fn toggle_pin(&self, user_id: i64, session_id: i64) -> Result<bool> {
        self.owned_session(user_id, session_id).await?;
        self.repo.toggle_pin(session_id).await
    }

    pub async fn update_knowledge_bases(
        &self,
        user_id: i64,
        session_id: i64,
        knowledge_base_ids: Vec<i64>,
    ) -> Result<()> {
        self.owned_session(user_id, session_id).await?;
        self.repo
            .set_knowledge_bases(session_id, &dedup_preserving_order(knowledge_base_ids))
            .await
    }

    #[instrument(skip(self), fields(subsystem = "chat", component = "sessions", op = "delete"))]
    pub async fn delete_session(&self, user_id: i64, session_id: i64) -> Result<()> {
        self.owned_session(user_id, session_id).await?;
        self.repo.delete_session(session_id).await?;
        info!(session_id, "Chat session deleted");
        Ok(())
    }
}
