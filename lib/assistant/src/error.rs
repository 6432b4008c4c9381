//! Error types for the assistant crate.
//!
//! A failure aborts only the utterance being processed. History persisted
//! before the failure is kept, and no outbound reply is produced.
//! Missing operators and failed notifications are logged outcomes, not
//! errors.

use relaydesk_conversation::StoreError;
use std::fmt;

/// Errors from processing one inbound utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantError {
    /// The inbound message id was already processed.
    DuplicateEvent { message_id: String },
    /// The inbound event carried neither text nor a selected option.
    EmptyEvent { message_id: String },
    /// The model requested a function call with unusable arguments.
    InvalidToolArguments { reason: String },
    /// The backend failed, timed out or returned no usable choice.
    UpstreamResponseMalformed { reason: String },
    /// Configuration could not be applied.
    InvalidConfig { reason: String },
    /// The Conversation Store failed.
    Store(StoreError),
}

impl fmt::Display for AssistantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateEvent { message_id } => {
                write!(f, "inbound event {message_id} already processed")
            }
            Self::EmptyEvent { message_id } => {
                write!(f, "inbound event {message_id} has no text or selection")
            }
            Self::InvalidToolArguments { reason } => {
                write!(f, "invalid tool arguments: {reason}")
            }
            Self::UpstreamResponseMalformed { reason } => {
                write!(f, "upstream response malformed: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid assistant configuration: {reason}")
            }
            Self::Store(err) => write!(f, "conversation store: {err}"),
        }
    }
}

impl std::error::Error for AssistantError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for AssistantError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl AssistantError {
    /// Returns true for outcomes that are silently dropped rather than
    /// reported as failures.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::DuplicateEvent { .. } | Self::EmptyEvent { .. }
        )
    }
}

/// Errors from the outbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundError {
    /// The channel rejected or never received the message.
    SendFailed { reason: String },
}

impl fmt::Display for OutboundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendFailed { reason } => write!(f, "outbound send failed: {reason}"),
        }
    }
}

impl std::error::Error for OutboundError {}
