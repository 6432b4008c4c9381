//! Core domain types and utilities for relaydesk.
//!
//! This crate provides the identifiers and error handling shared by the
//! conversation, operator and assistant crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{AreaId, ConversationId, OperatorId, ParseIdError, UserId};
