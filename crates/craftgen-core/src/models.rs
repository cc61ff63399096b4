//! Core data models for craftgen.
//!
//! These types are shared across all craftgen crates. JSON field names are
//! camelCase because the same shapes travel to and from the web client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

// =============================================================================
// DESIGN TYPES
// =============================================================================

/// A material used by a design, with its surface finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub name: String,
    pub finish: String,
}

/// A named color with its hex code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColorSwatch {
    pub name: String,
    pub hex: String,
}

/// Structured product concept produced by the concept synthesizer.
///
/// Immutable once returned; the caller owns persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DesignConcept {
    pub concept_name: String,
    pub design_philosophy: String,
    pub cultural_context: String,
    pub form_factor: String,
    pub dimensions: String,
    pub user_interaction: String,
    pub materials: Vec<Material>,
    pub colors: Vec<ColorSwatch>,
    pub key_features: Vec<String>,
}

impl DesignConcept {
    /// Materials rendered as `"<name><sep><finish>"` and joined with `", "`.
    pub fn materials_joined(&self, name_finish_sep: &str) -> String {
        self.materials
            .iter()
            .map(|m| format!("{}{}{}", m.name, name_finish_sep, m.finish))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Color names joined with `", "`.
    pub fn colors_joined(&self) -> String {
        self.colors
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Key features joined with `", "`.
    pub fn key_features_joined(&self) -> String {
        self.key_features.join(", ")
    }
}

/// Staging aggregate threaded by the caller across the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DesignProject {
    pub id: String,
    pub concept: DesignConcept,
    pub blueprint_url: Option<String>,
    pub product_shot_url: Option<String>,
    pub kv_url: Option<String>,
    pub lifestyle_url: Option<String>,
    pub detail_url: Option<String>,
}

impl DesignProject {
    /// A fresh project holding only a concept.
    pub fn from_concept(concept: DesignConcept) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            concept,
            blueprint_url: None,
            product_shot_url: None,
            kv_url: None,
            lifestyle_url: None,
            detail_url: None,
        }
    }
}

/// One prior turn of the design conversation.
///
/// Clients sometimes send turns with a null `role` or `content`; those are
/// accepted here and left out of prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ConversationTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            content: Some(content.into()),
        }
    }

    /// Role and content, if both are present.
    pub fn parts(&self) -> Option<(&str, &str)> {
        Some((self.role.as_deref()?, self.content.as_deref()?))
    }
}

/// Request body shared by the pipeline endpoints.
///
/// Stage 1 reads `idea`, `use_rag` and `chat_history`; stages 2 and 3 read
/// the round-tripped `concept` and `blueprint_url`. `generate_image` is
/// accepted for client compatibility and ignored: every image stage has its
/// own endpoint, so a stage runs exactly when it is called.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDesignRequest {
    #[serde(default)]
    pub idea: Option<String>,
    #[serde(default)]
    pub use_rag: bool,
    #[serde(default)]
    pub generate_image: bool,
    #[serde(default)]
    pub concept: Option<DesignConcept>,
    #[serde(default)]
    pub blueprint_url: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ConversationTurn>,
}

/// Output of an image stage. `image_url` is always durable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub image_url: String,
}

/// Market, technical and risk reports for a concept.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    #[schema(value_type = Object)]
    pub market_analysis: JsonValue,
    #[schema(value_type = Object)]
    pub technical_feasibility: JsonValue,
    #[schema(value_type = Object)]
    pub risk_assessment: JsonValue,
}

// =============================================================================
// RETRIEVAL TYPES
// =============================================================================

/// A text chunk returned by similarity search, most similar first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub text: String,
    pub source_knowledge_base_id: i64,
}

/// Knowledge base id and display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseRef {
    pub id: i64,
    pub name: String,
}

// =============================================================================
// CHAT TYPES
// =============================================================================

/// A knowledge chat session, owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: i64,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub user_id: i64,
    pub title: String,
    pub knowledge_base_ids: Vec<i64>,
    pub message_count: i32,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "USER",
            MessageRole::Assistant => "ASSISTANT",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "USER" => Ok(MessageRole::User),
            "ASSISTANT" => Ok(MessageRole::Assistant),
            other => Err(crate::Error::Serialization(format!(
                "unknown message role '{}'",
                other
            ))),
        }
    }
}

/// One persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub order: i32,
    pub completed: bool,
    pub source_knowledge_base_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

/// Session plus its ordered messages.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// Result of persisting the two rows that open a chat turn.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    /// Session state after the message counter advanced.
    pub session: ChatSession,
    pub user_message_id: i64,
    pub assistant_message_id: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub knowledge_base_ids: Vec<i64>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameSessionRequest {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKnowledgeBasesRequest {
    pub knowledge_base_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskQuestionRequest {
    pub question: String,
}

/// Serialize source knowledge-base ids for storage (`"5,7"`).
pub fn format_source_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse the stored form written by [`format_source_ids`].
///
/// Also accepts a bracketed list (`"[5,7]"`); unparseable entries are skipped.
pub fn parse_source_ids(raw: &str) -> Vec<i64> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

/// Deduplicate ids keeping first-seen order.
pub fn dedup_preserving_order(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut out: Vec<i64> = Vec::new();
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
