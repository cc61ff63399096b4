//! Knowledge chat handlers: session management and streamed answers.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive};
use axum::response::Sse;
use axum::Json;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

use craftgen_core::defaults::{CHAT_CHANNEL_CAPACITY, SSE_KEEPALIVE_SECS};
use craftgen_core::{
    AskQuestionRequest, ChatSession, CreateSessionRequest, RenameSessionRequest, SessionDetail,
    UpdateKnowledgeBasesRequest,
};

use super::CallerId;
use crate::services::TurnEvent;
use crate::{ApiError, AppState};

/// Escape line breaks so one increment stays one `data:` line.
pub fn escape_sse_data(text: &str) -> String {
    text.replace('\n', "\\n").replace('\r', "\\r")
}

/// Render a turn event as an SSE event.
pub fn to_sse_event(event: TurnEvent) -> Event {
    match event {
        TurnEvent::Message(text) => Event::default().event("message").data(escape_sse_data(&text)),
        TurnEvent::Error(message) => Event::default()
            .event("error")
            .data(escape_sse_data(&message)),
        TurnEvent::Done {
            message_id,
            source_knowledge_base_ids,
        } => Event::default().event("done").data(
            serde_json::json!({
                "messageId": message_id,
                "sourceKnowledgeBaseIds": source_knowledge_base_ids,
            })
            .to_string(),
        ),
    }
}

/// Create a chat session.
///
/// POST /api/v1/chat/sessions
#[utoipa::path(post, path = "/api/v1/chat/sessions", tag = "Chat",
    request_body = CreateSessionRequest,
    responses((status = 201, description = "Session created", body = ChatSession)))]
pub async fn create_session(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ChatSession>), ApiError> {
    let session = state.sessions.create_session(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// List the caller's sessions, pinned first.
///
/// GET /api/v1/chat/sessions
#[utoipa::path(get, path = "/api/v1/chat/sessions", tag = "Chat",
    responses((status = 200, description = "Sessions", body = [ChatSession])))]
pub async fn list_sessions(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<Vec<ChatSession>>, ApiError> {
    Ok(Json(state.sessions.list_sessions(user_id).await?))
}

/// Session with its messages.
///
/// GET /api/v1/chat/sessions/:id
#[utoipa::path(get, path = "/api/v1/chat/sessions/{id}", tag = "Chat",
    params(("id" = i64, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session detail", body = SessionDetail),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown session")))]
pub async fn get_session(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(session_id): Path<i64>,
) -> Result<Json<SessionDetail>, ApiError> {
    Ok(Json(state.sessions.session_detail(user_id, session_id).await?))
}

/// PUT /api/v1/chat/sessions/:id/title
#[utoipa::path(put, path = "/api/v1/chat/sessions/{id}/title", tag = "Chat",
    params(("id" = i64, Path, description = "Session id")),
    request_body = RenameSessionRequest,
    responses((status = 204, description = "Renamed")))]
pub async fn rename_session(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(session_id): Path<i64>,
    Json(request): Json<RenameSessionRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .rename_session(user_id, session_id, &request.title)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/chat/sessions/:id/pin
#[utoipa::path(put, path = "/api/v1/chat/sessions/{id}/pin", tag = "Chat",
    params(("id" = i64, Path, description = "Session id")),
    responses((status = 200, description = "New pinned state")))]
pub async fn toggle_pin(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(session_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let is_pinned = state.sessions.toggle_pin(user_id, session_id).await?;
    Ok(Json(serde_json::json!({ "isPinned": is_pinned })))
}

/// PUT /api/v1/chat/sessions/:id/knowledge-bases
#[utoipa::path(put, path = "/api/v1/chat/sessions/{id}/knowledge-bases", tag = "Chat",
    params(("id" = i64, Path, description = "Session id")),
    request_body = UpdateKnowledgeBasesRequest,
    responses((status = 204, description = "Updated")))]
pub async fn update_knowledge_bases(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(session_id): Path<i64>,
    Json(request): Json<UpdateKnowledgeBasesRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .update_knowledge_bases(user_id, session_id, request.knowledge_base_ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/chat/sessions/:id
#[utoipa::path(delete, path = "/api/v1/chat/sessions/{id}", tag = "Chat",
    params(("id" = i64, Path, description = "Session id")),
    responses((status = 204, description = "Deleted")))]
pub async fn delete_session(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(session_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.sessions.delete_session(user_id, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Ask a question and receive the answer as Server-Sent Events.
///
/// The turn is prepared before the stream opens, so unknown or foreign
/// sessions fail as ordinary HTTP errors. The answer then runs on its own
/// task and is persisted even if the client goes away.
///
/// POST /api/v1/chat/sessions/:id/messages/stream
#[utoipa::path(post, path = "/api/v1/chat/sessions/{id}/messages/stream", tag = "Chat",
    params(("id" = i64, Path, description = "Session id")),
    request_body = AskQuestionRequest,
    responses(
        (status = 200, description = "text/event-stream of message, error and done events"),
        (status = 400, description = "Blank question"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown session")))]
pub async fn stream_message(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(session_id): Path<i64>,
    Json(request): Json<AskQuestionRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (prepared, context) = state
        .chat
        .prepare(user_id, session_id, &request.question)
        .await?;

    let (tx, rx) = mpsc::channel(CHAT_CHANNEL_CAPACITY);
    let chat = state.chat.clone();
    let question = request.question.trim().to_string();
    tokio::spawn(async move {
        chat.run_turn(prepared, context, question, tx).await;
    });

    let stream = ReceiverStream::new(rx).map(|event| Ok(to_sse_event(event)));
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_sse_data() {
        assert_eq!(escape_sse_data("a\nb\r\nc"), "a\\nb\\r\\nc");
        assert_eq!(escape_sse_data("plain"), "plain");
    }
}
