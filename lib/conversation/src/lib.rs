//! Conversation engine primitives for relaydesk.
//!
//! This crate provides:
//!
//! - **Turns**: role-tagged entries of a conversation log, including tool
//!   invocations and tool results
//! - **Conversation Store**: durable per-user append-only history plus
//!   delegation metadata
//! - **Deduplicator**: bounded set of recently seen inbound message ids
//! - **Sequence Builder**: reconstructs a tool-call-consistent prompt
//!   sequence from stored history
//! - **Time Context**: temporal context injected into assistant prompts

pub mod conversation;
pub mod dedup;
pub mod error;
pub mod sequence;
pub mod store;
pub mod time_context;
pub mod turn;

pub use conversation::{AppendOutcome, Conversation, ConversationSummary};
pub use dedup::{DEFAULT_DEDUP_CAPACITY, Deduplicator};
pub use error::StoreError;
pub use sequence::{DEFAULT_HISTORY_WINDOW, build_prompt_sequence, recent_window};
pub use store::{ConversationStore, InMemoryConversationStore};
pub use time_context::TimeContextBuilder;
pub use turn::{ToolInvocation, Turn, TurnRole};
