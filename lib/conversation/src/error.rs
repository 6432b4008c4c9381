//! Error types for the conversation crate.
//!
//! `StoreError` covers every Conversation Store backend; a suppressed
//! duplicate append is not an error (see [`crate::AppendOutcome`]).

use relaydesk_core::UserId;
use std::fmt;

/// Errors from conversation store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No conversation exists for the user.
    NotFound { user_id: UserId },
    /// The turn cannot be stored as given.
    InvalidTurn { reason: String },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { user_id } => write!(f, "conversation not found for user {user_id}"),
            Self::InvalidTurn { reason } => write!(f, "invalid turn: {reason}"),
            Self::StorageFailed { reason } => {
                write!(f, "conversation storage failed: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
