//! Knowledge chat turns.
//!
//! A turn runs `prepare`, then `stream`, then `complete`. The knowledge bases
//! behind an answer travel inside the [`TurnContext`] returned by `stream`,
//! never through shared state, so concurrent turns cannot see each other's
//! sources.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn, Instrument};

use craftgen_core::defaults::{CHAT_TOP_K, ERROR_ANSWER_PREFIX, NO_RELEVANT_INFORMATION};
use craftgen_core::{
    ChatRepository, ChatSession, Error, GenerationBackend, KnowledgeBaseCatalog, PreparedTurn,
    Result, TurnContext,
};
use craftgen_inference::{single_chunk, TokenStream};

use super::prompts::{chat_user_prompt, CHAT_SYSTEM_PROMPT};
use super::retriever::{join_context, ContextRetriever};

/// Pause before retrying a failed completion write.
const COMPLETE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// An answer stream plus the context that produced it.
pub struct TurnAnswer {
    pub context: TurnContext,
    pub chunks: TokenStream,
}

/// Transport-neutral events emitted by a running turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// One increment of answer content.
    Message(String),
    /// The turn failed; content persisted so far is degraded.
    Error(String),
    /// Final event, after the assistant message was finalized.
    Done {
        message_id: i64,
        source_knowledge_base_ids: Vec<i64>,
    },
}

/// Drives chat turns against the session's knowledge bases.
#[derive(Clone)]
pub struct ChatOrchestrator {
    repo: Arc<dyn ChatRepository>,
    catalog: Arc<dyn KnowledgeBaseCatalog>,
    retriever: ContextRetriever,
    generator: Arc<dyn GenerationBackend>,
}

impl ChatOrchestrator {
    pub fn new(
        repo: Arc<dyn ChatRepository>,
        catalog: Arc<dyn KnowledgeBaseCatalog>,
        retriever: ContextRetriever,
        generator: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            repo,
            catalog,
            retriever,
            generator,
        }
    }

    /// Persist the USER message and the ASSISTANT placeholder.
    ///
    /// Fails with `SessionNotFound` or `Forbidden` before anything is written.
    #[instrument(skip(self, question), fields(subsystem = "chat", component = "orchestrator", op = "prepare"))]
    pub async fn prepare(
        &self,
        user_id: i64,
        session_id: i64,
        question: &str,
    ) -> Result<(PreparedTurn, TurnContext)> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }
        let prepared = self.repo.prepare_turn(user_id, session_id, question).await?;
        let context = TurnContext::for_turn(&prepared);
        debug!(
            request_id = %context.request_id,
            message_id = prepared.assistant_message_id,
            "Turn prepared"
        );
        Ok((prepared, context))
    }

    /// Retrieve scoped context and produce the answer stream.
    ///
    /// Sources are fixed on `context` before any answer content exists. An
    /// empty retrieval answers with a fixed message and skips the model.
    #[instrument(
        skip(self, session, question, context),
        fields(
            subsystem = "chat",
            component = "orchestrator",
            op = "stream",
            session_id = session.id,
            request_id = %context.request_id
        )
    )]
    pub async fn stream(
        &self,
        session: &ChatSession,
        question: &str,
        mut context: TurnContext,
    ) -> Result<TurnAnswer> {
        let start = Instant::now();
        let scope = session.knowledge_base_ids.as_slice();

        self.catalog.record_questions(scope).await?;
        let chunks = self
            .retriever
            .retrieve(question, Some(scope), CHAT_TOP_K)
            .await?;
        context.record_sources(&chunks);

        let Some(reference) = join_context(&chunks) else {
            info!("No relevant chunks, answering without the model");
            return Ok(TurnAnswer {
                context,
                chunks: single_chunk(NO_RELEVANT_INFORMATION.to_string()),
            });
        };

        let prompt = chat_user_prompt(question, &reference);
        let answer = self
            .generator
            .generate_with_system(CHAT_SYSTEM_PROMPT, &prompt)
            .await?;

        info!(
            model = self.generator.model_name(),
            result_count = chunks.len(),
            sources = ?context.source_ids(),
            response_len = answer.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Answer generated"
        );
        Ok(TurnAnswer {
            context,
            chunks: single_chunk(answer),
        })
    }

    /// Finalize the ASSISTANT placeholder.
    pub async fn complete(&self, message_id: i64, content: &str, source_ids: &[i64]) -> Result<()> {
        self.repo
            .complete_message(message_id, content, source_ids)
            .await
    }

    /// Run a prepared turn to completion, emitting events on `events`.
    ///
    /// The placeholder is finalized whether or not the answer succeeded and
    /// whether or not anyone is still listening.
    pub async fn run_turn(
        &self,
        prepared: PreparedTurn,
        context: TurnContext,
        question: String,
        events: mpsc::Sender<TurnEvent>,
    ) {
        let span = tracing::info_span!(
            "chat_turn",
            subsystem = "chat",
            request_id = %context.request_id,
            session_id = prepared.session.id,
            message_id = prepared.assistant_message_id
        );
        self.drive_turn(prepared, context, question, events)
            .instrument(span)
            .await
    }

    async fn drive_turn(
        &self,
        prepared: PreparedTurn,
        context: TurnContext,
        question: String,
        events: mpsc::Sender<TurnEvent>,
    ) {
        let message_id = prepared.assistant_message_id;
        let mut received = String::new();
        let mut source_ids = Vec::new();
        let mut failure: Option<String> = None;

        match self.stream(&prepared.session, &question, context).await {
            Ok(TurnAnswer {
                mut context,
                mut chunks,
            }) => {
                source_ids = context.take_source_ids();
                while let Some(item) = chunks.next().await {
                    match item {
                        Ok(text) => {
                            received.push_str(&text);
                            if events.send(TurnEvent::Message(text)).await.is_err() {
                                debug!("Client disconnected, continuing turn");
                            }
                        }
                        Err(e) => {
                            failure = Some(e.to_string());
                            break;
                        }
                    }
                }
            }
            Err(e) => failure = Some(e.to_string()),
        }

        let content = match &failure {
            Some(message) if received.is_empty() => format!("{}{}", ERROR_ANSWER_PREFIX, message),
            _ => received,
        };
        if let Some(message) = &failure {
            warn!(error = %message, partial = !content.starts_with(ERROR_ANSWER_PREFIX), "Chat turn failed");
        }

        let persisted = self.complete_with_retry(message_id, &content, &source_ids).await;

        if let Some(message) = failure {
            let _ = events.send(TurnEvent::Error(message)).await;
        } else if let Err(e) = &persisted {
            let _ = events.send(TurnEvent::Error(e.to_string())).await;
        }
        let _ = events
            .send(TurnEvent::Done {
                message_id,
                source_knowledge_base_ids: source_ids,
            })
            .await;
    }

    async fn complete_with_retry(
        &self,
        message_id: i64,
        content: &str,
        source_ids: &[i64],
    ) -> Result<()> {
        match self.complete(message_id, content, source_ids).await {
            Ok(()) => Ok(()),
            Err(Error::Conflict(msg)) => {
                warn!(error = %msg, "Assistant message was already completed");
                Err(Error::Conflict(msg))
            }
            Err(first) => {
                warn!(error = %first, "Completing assistant message failed, retrying once");
                tokio::time::sleep(COMPLETE_RETRY_DELAY).await;
                self.complete(message_id, content, source_ids)
                    .await
                    .inspect_err(|e| {
                        error!(error = %e, "Assistant message left incomplete");
                    })
            }
        }
    }
}
