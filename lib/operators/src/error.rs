//! Error types for the operators crate.
//!
//! An empty candidate list is not an error; callers get `None` from
//! [`crate::select_operator`] and fall back to generic messaging.

use std::fmt;

/// Errors from Operator Directory backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The backing store could not be read.
    LookupFailed { reason: String },
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LookupFailed { reason } => write!(f, "operator lookup failed: {reason}"),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Errors from real-time notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Connecting to the channel failed.
    ConnectionFailed { reason: String },
    /// The payload could not be encoded.
    EncodeFailed { reason: String },
    /// The publish was rejected or could not be sent.
    PublishFailed { subject: String, reason: String },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "notification channel connection failed: {reason}")
            }
            Self::EncodeFailed { reason } => {
                write!(f, "failed to encode notification: {reason}")
            }
            Self::PublishFailed { subject, reason } => {
                write!(f, "failed to publish to '{subject}': {reason}")
            }
        }
    }
}

impl std::error::Error for NotifyError {}
