//! Chat session and message repository.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};

use craftgen_core::{
    format_source_ids, parse_source_ids, ChatMessage, ChatRepository, ChatSession, Error,
    PreparedTurn, Result,
};

const SESSION_COLUMNS: &str =
    "id, user_id, title, knowledge_base_ids, message_count, is_pinned, created_at, updated_at";

/// PostgreSQL implementation of ChatRepository.
#[derive(Clone)]
pub struct PgChatRepository {
    pool: Pool<Postgres>,
}

impl PgChatRepository {
    /// Create a new PgChatRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn session_from_row(row: &PgRow) -> ChatSession {
    ChatSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        knowledge_base_ids: row.get("knowledge_base_ids"),
        message_count: row.get("message_count"),
        is_pinned: row.get("is_pinned"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn message_from_row(row: &PgRow) -> Result<ChatMessage> {
    let role: String = row.get("role");
    let sources: String = row.get("source_kb_ids");
    Ok(ChatMessage {
        id: row.get("id"),
        session_id: row.get("session_id"),
        role: role.parse()?,
        content: row.get("content"),
        order: row.get("message_order"),
        completed: row.get("completed"),
        source_knowledge_base_ids: parse_source_ids(&sources),
        created_at: row.get("created_at"),
    })
}

/// Map "no row updated" onto NotFound for session-level updates.
fn require_session(rows_affected: u64, session_id: i64) -> Result<()> {
    if rows_affected == 0 {
        Err(Error::SessionNotFound(session_id))
    } else {
        Ok(())
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn create_session(
        &self,
        user_id: i64,
        title: &str,
        knowledge_base_ids: &[i64],
    ) -> Result<ChatSession> {
        let row = sqlx::query(&format!(
            "INSERT INTO chat_session (user_id, title, knowledge_base_ids)
             VALUES ($1, $2, $3)
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(title)
        .bind(knowledge_base_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(session_from_row(&row))
    }

    async fn get_session(&self, session_id: i64) -> Result<Option<ChatSession>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chat_session WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(session_from_row))
    }

    async fn list_sessions(&self, user_id: i64) -> Result<Vec<ChatSession>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chat_session
             WHERE user_id = $1
             ORDER BY is_pinned DESC, updated_at DESC, id DESC",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(session_from_row).collect())
    }

    async fn rename_session(&self, session_id: i64, title: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE chat_session SET title = $2, updated_at = NOW() WHERE id = $1")
                .bind(session_id)
                .bind(title)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        require_session(result.rows_affected(), session_id)
    }

    async fn toggle_pin(&self, session_id: i64) -> Result<bool> {
        let pinned: Option<bool> = sqlx::query_scalar(
            "UPDATE chat_session SET is_pinned = NOT is_pinned
             WHERE id = $1
             RETURNING is_pinned",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        pinned.ok_or(Error::SessionNotFound(session_id))
    }

    async fn set_knowledge_bases(
        &self,
        session_id: i64,
        knowledge_base_ids: &[i64],
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE chat_session SET knowledge_base_ids = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(session_id)
        .bind(knowledge_base_ids)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        require_session(result.rows_affected(), session_id)
    }

    async fn delete_session(&self, session_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM chat_session WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        require_session(result.rows_affected(), session_id)
    }

    #[instrument(skip(self, question), fields(subsystem = "db", component = "chat", op = "prepare_turn"))]
    async fn prepare_turn(
        &self,
        user_id: i64,
        session_id: i64,
        question: &str,
    ) -> Result<PreparedTurn> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Row lock serializes concurrent turns on the same session.
        let locked = sqlx::query("SELECT user_id, message_count FROM chat_session WHERE id = $1 FOR UPDATE")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::SessionNotFound(session_id))?;

        let owner: i64 = locked.get("user_id");
        if owner != user_id {
            return Err(Error::Forbidden(format!(
                "session {} belongs to another user",
                session_id
            )));
        }
        let count: i32 = locked.get("message_count");

        let user_message_id: i64 = sqlx::query_scalar(
            "INSERT INTO chat_message (session_id, role, content, message_order, completed)
             VALUES ($1, 'USER', $2, $3, TRUE)
             RETURNING id",
        )
        .bind(session_id)
        .bind(question)
        .bind(count)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let assistant_message_id: i64 = sqlx::query_scalar(
            "INSERT INTO chat_message (session_id, role, content, message_order, completed)
             VALUES ($1, 'ASSISTANT', '', $2, FALSE)
             RETURNING id",
        )
        .bind(session_id)
        .bind(count + 1)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "UPDATE chat_session
             SET message_count = message_count + 2, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            session_id,
            user_message_id, assistant_message_id, "Chat turn prepared"
        );

        Ok(PreparedTurn {
            session: session_from_row(&row),
            user_message_id,
            assistant_message_id,
        })
    }

    #[instrument(skip(self, content), fields(subsystem = "db", component = "chat", op = "complete_message"))]
    async fn complete_message(
        &self,
        message_id: i64,
        content: &str,
        source_ids: &[i64],
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE chat_message
             SET content = $2, completed = TRUE, source_kb_ids = $3, updated_at = NOW()
             WHERE id = $1 AND completed = FALSE",
        )
        .bind(message_id)
        .bind(content)
        .bind(format_source_ids(source_ids))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: Option<bool> =
            sqlx::query_scalar("SELECT completed FROM chat_message WHERE id = $1")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        match exists {
            Some(_) => Err(Error::Conflict(format!(
                "message {} is already completed",
                message_id
            ))),
            None => Err(Error::NotFound(format!("message {}", message_id))),
        }
    }

    async fn list_messages(&self, session_id: i64) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, message_order, completed, source_kb_ids, created_at
             FROM chat_message
             WHERE session_id = $1
             ORDER BY message_order",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(message_from_row).collect()
    }
}
