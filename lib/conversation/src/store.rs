//! Conversation Store abstraction.
//!
//! Implementations must make read-last-turn-then-append atomic per user so
//! concurrent retries for the same user cannot lose or double an append.
//! No operation spans more than one conversation.

use crate::conversation::{AppendOutcome, Conversation, ConversationSummary};
use crate::error::StoreError;
use crate::turn::Turn;
use async_trait::async_trait;
use relaydesk_core::{OperatorId, UserId};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Trait for conversation persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends a turn, creating the conversation if absent.
    ///
    /// Returns [`AppendOutcome::NoOp`] without mutating anything when the
    /// last stored turn has the same role and trimmed content.
    async fn append_turn(&self, user_id: &UserId, turn: Turn)
    -> Result<AppendOutcome, StoreError>;

    /// Returns the full ordered history; empty when no conversation exists.
    async fn get_history(&self, user_id: &UserId) -> Result<Vec<Turn>, StoreError>;

    /// Returns the last `limit` turns in conversational order.
    async fn recent_turns(&self, user_id: &UserId, limit: usize)
    -> Result<Vec<Turn>, StoreError>;

    /// Returns the conversation metadata, if the conversation exists.
    async fn summary(&self, user_id: &UserId) -> Result<Option<ConversationSummary>, StoreError>;

    /// Records the operator handling the conversation.
    ///
    /// Fails with [`StoreError::NotFound`] when no conversation exists.
    async fn assign_advisor(&self, user_id: &UserId, operator_id: OperatorId)
    -> Result<(), StoreError>;

    /// Flags the conversation as waiting on a human of `area`.
    ///
    /// Fails with [`StoreError::NotFound`] when no conversation exists.
    async fn mark_delegated(&self, user_id: &UserId, area: &str) -> Result<(), StoreError>;

    /// Lists conversations assigned to `operator_id` that still need a human
    /// response, oldest contact first.
    async fn pending_assignments(
        &self,
        operator_id: OperatorId,
    ) -> Result<Vec<ConversationSummary>, StoreError>;
}

/// Process-local conversation store.
///
/// A single lock guards the whole map, which makes every append atomic per
/// user. Used by tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<UserId, Conversation>>,
}

impl InMemoryConversationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns true if no conversation is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StoreError {
        StoreError::StorageFailed {
            reason: "conversation lock poisoned".to_string(),
        }
    }

    fn update<T>(
        &self,
        user_id: &UserId,
        f: impl FnOnce(&mut Conversation) -> T,
    ) -> Result<T, StoreError> {
        let mut conversations = self.conversations.write().map_err(|_| Self::poisoned())?;
        let conversation = conversations
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound {
                user_id: user_id.clone(),
            })?;
        Ok(f(conversation))
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append_turn(
        &self,
        user_id: &UserId,
        turn: Turn,
    ) -> Result<AppendOutcome, StoreError> {
        turn.validate()
            .map_err(|reason| StoreError::InvalidTurn { reason })?;

        let mut conversations = self.conversations.write().map_err(|_| Self::poisoned())?;
        let conversation = conversations
            .entry(user_id.clone())
            .or_insert_with(|| Conversation::new(user_id.clone()));
        let outcome = conversation.append(turn);
        if outcome == AppendOutcome::NoOp {
            debug!(user_id = %user_id, "suppressed repeated turn");
        }
        Ok(outcome)
    }

    async fn get_history(&self, user_id: &UserId) -> Result<Vec<Turn>, StoreError> {
        let conversations = self.conversations.read().map_err(|_| Self::poisoned())?;
        Ok(conversations
            .get(user_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default())
    }

    async fn recent_turns(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        let conversations = self.conversations.read().map_err(|_| Self::poisoned())?;
        Ok(conversations
            .get(user_id)
            .map(|c| crate::sequence::recent_window(&c.messages, limit).to_vec())
            .unwrap_or_default())
    }

    async fn summary(&self, user_id: &UserId) -> Result<Option<ConversationSummary>, StoreError> {
        let conversations = self.conversations.read().map_err(|_| Self::poisoned())?;
        Ok(conversations.get(user_id).map(Conversation::summary))
    }

    async fn assign_advisor(
        &self,
        user_id: &UserId,
        operator_id: OperatorId,
    ) -> Result<(), StoreError> {
        self.update(user_id, |c| c.assign_advisor(operator_id))
    }

    async fn mark_delegated(&self, user_id: &UserId, area: &str) -> Result<(), StoreError> {
        self.update(user_id, |c| c.mark_delegated(area))
    }

    async fn pending_assignments(
        &self,
        operator_id: OperatorId,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let conversations = self.conversations.read().map_err(|_| Self::poisoned())?;
        let mut pending: Vec<ConversationSummary> = conversations
            .values()
            .map(Conversation::summary)
            .filter(|s| s.is_pending_for(operator_id))
            .collect();
        pending.sort_by_key(|s| s.last_contact_at);
        Ok(pending)
    }
}
