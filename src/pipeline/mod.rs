//! Retrieval orchestration.
//!
//! `RagPipeline::answer` runs the fixed query path: embed the query,
//! search the owner's namespace, assemble context and history, delegate
//! to the response generator. Retrieval faults never abort the turn;
//! they degrade to the context sentinel or empty history. Only a
//! generation failure reaches the caller, and it does so typed.

use std::sync::Arc;

use crate::core::config::RagSettings;
use crate::core::errors::RagError;
use crate::embeddings::EmbeddingProvider;
use crate::generation::{ChatMessage, ResponseGenerator};
use crate::history::{ChatTurn, HistoryStore};
use crate::store::{namespace_for_owner, VectorStore};

/// Placed in the prompt when retrieval produced nothing, so the model
/// never sees an ambiguous empty context.
pub const NO_CONTEXT_SENTINEL: &str = "no relevant context found";

pub struct RagPipeline {
    embeddings: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    history: HistoryStore,
    generator: ResponseGenerator,
    settings: RagSettings,
}

impl RagPipeline {
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        history: HistoryStore,
        generator: ResponseGenerator,
        settings: RagSettings,
    ) -> Self {
        Self {
            embeddings,
            vectors,
            history,
            generator,
            settings,
        }
    }

    /// Answer `query` for `owner_id` using retrieved context and the
    /// owner's recent chat history.
    pub async fn answer(&self, owner_id: i64, query: &str) -> Result<String, RagError> {
        let context = self.retrieve_context(owner_id, query).await;

        let turns = match self
            .history
            .recent_turns(owner_id, self.settings.history_limit)
            .await
        {
            Ok(turns) => turns,
            Err(err) => {
                tracing::warn!("Failed to load chat history: {}", err);
                Vec::new()
            }
        };
        let history = history_messages(&turns, self.settings.history_limit);

        self.generator.generate(query, &context, history).await
    }

    /// Like [`answer`](Self::answer), additionally persisting the turn
    /// once generation succeeds.
    pub async fn answer_and_record(&self, owner_id: i64, query: &str) -> Result<String, RagError> {
        let response = self.answer(owner_id, query).await?;

        if let Err(err) = self.history.record_turn(owner_id, query, &response).await {
            tracing::warn!("Failed to record chat turn: {}", err);
        }

        Ok(response)
    }

    /// Top-k context texts for the query, or the sentinel when there is
    /// nothing to retrieve.
    async fn retrieve_context(&self, owner_id: i64, query: &str) -> Vec<String> {
        let embedding = match self.embeddings.embed_one(query).await {
            Ok(Some(embedding)) => Some(embedding),
            Ok(None) => {
                tracing::warn!("Query embedding unavailable; answering without context");
                None
            }
            Err(err) => {
                tracing::warn!("Query embedding failed: {}", err);
                None
            }
        };

        let mut context = Vec::new();
        if let Some(embedding) = embedding {
            match self
                .vectors
                .search(
                    &namespace_for_owner(owner_id),
                    &embedding,
                    self.settings.top_k,
                )
                .await
            {
                Ok(hits) => context = hits.into_iter().map(|hit| hit.text).collect(),
                Err(err) => {
                    tracing::warn!("Similarity search failed: {}", err);
                }
            }
        }

        if context.is_empty() {
            context.push(NO_CONTEXT_SENTINEL.to_string());
        }
        context
    }
}

/// Convert recent turns into the alternating user/assistant sequence,
/// chronological, capped at `limit` turns (2·limit messages).
fn history_messages(turns: &[ChatTurn], limit: usize) -> Vec<ChatMessage> {
    let start = turns.len().saturating_sub(limit);

    let mut messages = Vec::with_capacity(2 * limit);
    for turn in &turns[start..] {
        messages.push(ChatMessage::user(turn.query.clone()));
        messages.push(ChatMessage::assistant(turn.response.clone()));
    }
    messages
}
