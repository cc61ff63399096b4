//! Per-turn correlation between a chat answer and its knowledge sources.
//!
//! A [`TurnContext`] is created when a turn is prepared, moved through
//! retrieval and generation, and handed back with the answer. The transport
//! reads the source ids from that value, so two turns running on the same
//! worker can never observe each other's sources.

use uuid::Uuid;

use crate::models::{dedup_preserving_order, PreparedTurn, RetrievedChunk};

/// Request-scoped state for one chat turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub request_id: Uuid,
    pub session_id: i64,
    pub user_message_id: i64,
    pub assistant_message_id: i64,
    source_ids: Vec<i64>,
}

impl TurnContext {
    pub fn new(session_id: i64, user_message_id: i64, assistant_message_id: i64) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            session_id,
            user_message_id,
            assistant_message_id,
            source_ids: Vec::new(),
        }
    }

    /// Context for a freshly prepared turn.
    pub fn for_turn(turn: &PreparedTurn) -> Self {
        Self::new(
            turn.session.id,
            turn.user_message_id,
            turn.assistant_message_id,
        )
    }

    /// Record the knowledge bases behind the retrieved chunks.
    ///
    /// Replaces any earlier value; ids are deduplicated in encounter order.
    pub fn record_sources(&mut self, chunks: &[RetrievedChunk]) {
        self.source_ids = dedup_preserving_order(chunks.iter().map(|c| c.source_knowledge_base_id));
    }

    pub fn source_ids(&self) -> &[i64] {
        &self.source_ids
    }

    /// Consume the recorded ids, leaving the slot empty.
    pub fn take_source_ids(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.source_ids)
    }
}
