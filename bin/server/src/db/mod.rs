//! Database repositories for relaydesk.
//!
//! This module provides PostgreSQL implementations of:
//! - The conversation store (turn logs and delegation metadata)
//! - The operator directory (areas and operator availability)

pub mod conversation;
pub mod operator;

pub use conversation::PgConversationStore;
pub use operator::PgOperatorDirectory;
