//! Inbound gateway.
//!
//! Sits between the messaging channel and the [`Assistant`]: drops empty
//! events, gates redeliveries through the [`Deduplicator`], dispatches text
//! or area selections, and hands the reply to the outbound sink. The
//! caller only needs an acknowledgement, so nothing here fails outward.

use crate::assistant::Assistant;
use crate::error::{AssistantError, OutboundError};
use async_trait::async_trait;
use relaydesk_conversation::Deduplicator;
use relaydesk_core::UserId;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What an inbound event carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    /// Free text typed by the user.
    Text(String),
    /// Id of an interactive list option; names an area.
    SelectedOption(String),
}

/// One message delivered by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// The channel's message id, stable across redeliveries.
    pub message_id: String,
    pub user_id: UserId,
    pub payload: InboundPayload,
}

impl InboundEvent {
    /// Creates a text event.
    #[must_use]
    pub fn text(
        message_id: impl Into<String>,
        user_id: impl Into<UserId>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            user_id: user_id.into(),
            payload: InboundPayload::Text(text.into()),
        }
    }

    /// Creates an option-selection event.
    #[must_use]
    pub fn selected_option(
        message_id: impl Into<String>,
        user_id: impl Into<UserId>,
        option_id: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            user_id: user_id.into(),
            payload: InboundPayload::SelectedOption(option_id.into()),
        }
    }

    /// Returns true if there is nothing to process.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let body = match &self.payload {
            InboundPayload::Text(text) => text,
            InboundPayload::SelectedOption(option) => option,
        };
        body.trim().is_empty() || self.user_id.is_empty()
    }
}

/// Best-effort delivery back to the user.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    /// Sends `text` to `user_id` with a single attempt.
    async fn send(&self, user_id: &UserId, text: &str) -> Result<(), OutboundError>;

    /// Offers `areas` as a selectable list; a selection comes back as an
    /// [`InboundPayload::SelectedOption`].
    async fn send_area_menu(&self, user_id: &UserId, areas: &[String])
    -> Result<(), OutboundError>;
}

/// What the gateway hands to the sink for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain text.
    Text(String),
    /// The area selection menu.
    AreaMenu(Vec<String>),
}

/// How an inbound event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A reply was produced and handed to the sink.
    Replied { reply: String },
    /// A reply was produced but the sink failed.
    Undelivered { reply: String },
    /// The area menu was offered; `delivered` is false if the sink failed.
    MenuOffered { delivered: bool },
    /// The event was empty or a redelivery.
    Dropped { reason: AssistantError },
    /// Processing failed; no reply was produced.
    Aborted { error: AssistantError },
}

/// Entry point for inbound channel events.
pub struct InboundGateway {
    assistant: Arc<Assistant>,
    dedup: Arc<Deduplicator>,
    sink: Arc<dyn OutboundSink>,
}

impl InboundGateway {
    #[must_use]
    pub fn new(
        assistant: Arc<Assistant>,
        dedup: Arc<Deduplicator>,
        sink: Arc<dyn OutboundSink>,
    ) -> Self {
        Self {
            assistant,
            dedup,
            sink,
        }
    }

    /// Returns the assistant behind this gateway.
    #[must_use]
    pub fn assistant(&self) -> &Arc<Assistant> {
        &self.assistant
    }

    /// Runs an event through the gate and the assistant without sending.
    ///
    /// Text containing one of the configured menu keywords is answered with
    /// the area menu instead of a model reply.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::EmptyEvent`] and
    /// [`AssistantError::DuplicateEvent`] for dropped events, and the
    /// assistant's error when processing aborts.
    pub async fn process(&self, event: &InboundEvent) -> Result<Reply, AssistantError> {
        if event.is_empty() {
            return Err(AssistantError::EmptyEvent {
                message_id: event.message_id.clone(),
            });
        }
        if !self.dedup.try_record(&event.message_id) {
            return Err(AssistantError::DuplicateEvent {
                message_id: event.message_id.clone(),
            });
        }

        match &event.payload {
            InboundPayload::Text(text) if self.assistant.config().wants_area_menu(text) => self
                .assistant
                .request_area_menu(&event.user_id, text)
                .await
                .map(Reply::AreaMenu),
            InboundPayload::Text(text) => self
                .assistant
                .respond(&event.user_id, text)
                .await
                .map(Reply::Text),
            InboundPayload::SelectedOption(option) => self
                .assistant
                .respond_to_selection(&event.user_id, option)
                .await
                .map(Reply::Text),
        }
    }

    /// Handles one inbound event end to end.
    #[instrument(skip(self, event), fields(message_id = %event.message_id, user_id = %event.user_id))]
    pub async fn handle_inbound_message(&self, event: InboundEvent) -> InboundOutcome {
        let reply = match self.process(&event).await {
            Ok(reply) => reply,
            Err(reason @ AssistantError::EmptyEvent { .. }) => {
                warn!("dropping inbound event without text or selection");
                return InboundOutcome::Dropped { reason };
            }
            Err(reason) if reason.is_silent() => {
                debug!(reason = %reason, "dropping inbound event");
                return InboundOutcome::Dropped { reason };
            }
            Err(error) => {
                error!(error = %error, "utterance aborted");
                return InboundOutcome::Aborted { error };
            }
        };

        match reply {
            Reply::Text(reply) => match self.sink.send(&event.user_id, &reply).await {
                Ok(()) => {
                    info!("reply sent");
                    InboundOutcome::Replied { reply }
                }
                Err(e) => {
                    warn!(error = %e, "outbound send failed");
                    InboundOutcome::Undelivered { reply }
                }
            },
            Reply::AreaMenu(areas) => {
                match self.sink.send_area_menu(&event.user_id, &areas).await {
                    Ok(()) => {
                        info!(areas = areas.len(), "area menu sent");
                        InboundOutcome::MenuOffered { delivered: true }
                    }
                    Err(e) => {
                        warn!(error = %e, "area menu send failed");
                        InboundOutcome::MenuOffered { delivered: false }
                    }
                }
            }
        }
    }
}
