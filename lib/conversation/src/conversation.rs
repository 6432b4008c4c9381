//! Per-user conversation records.
//!
//! A conversation is created lazily on the first inbound message for a
//! user and its turn log is append-only.

use crate::turn::Turn;
use chrono::{DateTime, Utc};
use relaydesk_core::{ConversationId, OperatorId, UserId};
use serde::{Deserialize, Serialize};

/// Result of appending a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The turn was appended.
    Appended,
    /// The last stored turn already had the same role and content.
    NoOp,
}

impl AppendOutcome {
    /// Returns true if the turn was stored.
    #[must_use]
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended)
    }
}

/// A conversation with one end-user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Internal identifier.
    pub id: ConversationId,
    /// The end-user this conversation belongs to.
    pub user_id: UserId,
    /// Turns in conversational order.
    pub messages: Vec<Turn>,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// Updated on every successful append.
    pub last_contact_at: DateTime<Utc>,
    /// Set when the conversation is delegated to a human area.
    pub needs_human_response: bool,
    /// Area the conversation was delegated to.
    pub assigned_area: Option<String>,
    /// Operator the conversation was assigned to.
    pub assigned_advisor: Option<OperatorId>,
}

impl Conversation {
    /// Creates an empty conversation for a user.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            user_id,
            messages: Vec::new(),
            created_at: now,
            last_contact_at: now,
            needs_human_response: false,
            assigned_area: None,
            assigned_advisor: None,
        }
    }

    /// Appends a turn unless it repeats the last stored turn.
    pub fn append(&mut self, turn: Turn) -> AppendOutcome {
        if self.last_turn().is_some_and(|last| last.repeats(&turn)) {
            return AppendOutcome::NoOp;
        }
        self.messages.push(turn);
        self.last_contact_at = Utc::now();
        AppendOutcome::Appended
    }

    /// Returns the last turn, if any.
    #[must_use]
    pub fn last_turn(&self) -> Option<&Turn> {
        self.messages.last()
    }

    /// Returns the number of stored turns.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.messages.len()
    }

    /// Records a delegation to `area`, starting a new delegation episode.
    ///
    /// Any advisor of a previous episode is released.
    pub fn mark_delegated(&mut self, area: impl Into<String>) {
        self.needs_human_response = true;
        self.assigned_area = Some(area.into());
        self.assigned_advisor = None;
    }

    /// Records the operator handling this conversation.
    pub fn assign_advisor(&mut self, operator_id: OperatorId) {
        self.assigned_advisor = Some(operator_id);
    }

    /// Returns a summary without the turn log.
    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            last_contact_at: self.last_contact_at,
            needs_human_response: self.needs_human_response,
            assigned_area: self.assigned_area.clone(),
            assigned_advisor: self.assigned_advisor,
            last_turn: self.last_turn().cloned(),
            turn_count: self.turn_count(),
        }
    }
}

/// Conversation metadata for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub last_contact_at: DateTime<Utc>,
    pub needs_human_response: bool,
    pub assigned_area: Option<String>,
    pub assigned_advisor: Option<OperatorId>,
    pub last_turn: Option<Turn>,
    pub turn_count: usize,
}

impl ConversationSummary {
    /// Returns true if this conversation waits on `operator_id`.
    #[must_use]
    pub fn is_pending_for(&self, operator_id: OperatorId) -> bool {
        self.needs_human_response && self.assigned_advisor == Some(operator_id)
    }
}
