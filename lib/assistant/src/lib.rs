//! Assistant orchestration for relaydesk.
//!
//! This crate ties the conversation engine, the language-model backend and
//! the operator directory together:
//!
//! - **Assistant**: the per-utterance state machine. One inbound user
//!   utterance yields at most one outbound reply and may delegate the
//!   conversation to a human area
//! - **Delegation**: the function offered to the model and the hand-off
//!   acknowledgement
//! - **Inbound gateway**: the dedup gate in front of the assistant and the
//!   outbound sink behind it

pub mod assistant;
pub mod config;
pub mod delegation;
pub mod error;
pub mod gateway;
pub mod prompt;

#[cfg(test)]
mod testing;

pub use assistant::{Assistant, Delegation};
pub use config::AssistantConfig;
pub use delegation::{DELEGATION_TOOL_NAME, DelegationArgs, delegation_tool};
pub use error::{AssistantError, OutboundError};
pub use gateway::{
    InboundEvent, InboundGateway, InboundOutcome, InboundPayload, OutboundSink, Reply,
};
