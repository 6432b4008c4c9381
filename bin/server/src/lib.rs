//! relaydesk server.
//!
//! Wires the assistant to its production collaborators: PostgreSQL for
//! conversations and operators, NATS for operator notifications, an
//! OpenAI-compatible model endpoint, and the WhatsApp Cloud API as both the
//! inbound event source and the outbound sink.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod whatsapp;
