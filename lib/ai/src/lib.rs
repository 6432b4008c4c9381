//! Language-model primitives for relaydesk.
//!
//! This crate provides:
//!
//! - **Backend**: the chat-completion interface the assistant drives,
//!   including function calling
//! - **Tools**: JSON-schema function declarations offered to the model
//! - **OpenAI-compatible backend**: an HTTP implementation for any
//!   `/chat/completions` endpoint (OpenRouter, OpenAI, local gateways)

pub mod backend;
pub mod error;
pub mod openai;
pub mod tool;

pub use backend::{
    LlmBackend, LlmMessage, LlmRequest, LlmResponse, LlmToolCall, MessageRole, TokenUsage,
};
pub use error::LlmError;
pub use openai::{LlmBackendConfig, OpenAiCompatibleBackend};
pub use tool::ToolDefinition;
