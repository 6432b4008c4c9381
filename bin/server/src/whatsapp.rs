//! WhatsApp Cloud API adapter.
//!
//! Inbound: the webhook body is parsed into [`InboundEvent`]s. Only user
//! messages are of interest; status callbacks carry no `messages` and
//! produce nothing.
//!
//! Outbound: [`WhatsAppSender`] posts plain text messages and the area
//! selection list through the Graph API with a single attempt.

use async_trait::async_trait;
use relaydesk_assistant::{InboundEvent, OutboundError, OutboundSink};
use relaydesk_core::UserId;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Graph API limit on rows in one list message.
const MAX_LIST_ROWS: usize = 10;

/// Graph API limit on a list row title.
const MAX_ROW_TITLE_CHARS: usize = 24;

/// WhatsApp Cloud API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppConfig {
    /// Business phone number id messages are sent from.
    pub phone_number_id: String,

    /// Graph API access token.
    pub access_token: String,

    /// Graph API version segment.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Graph API base URL.
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    /// Per-request timeout for outbound sends.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_api_version() -> String {
    "v22.0".to_string()
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

impl WhatsAppConfig {
    /// Returns the endpoint outbound messages are posted to.
    #[must_use]
    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.graph_base_url.trim_end_matches('/'),
            self.api_version,
            self.phone_number_id
        )
    }
}

/// Top-level webhook body.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: WebhookValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

/// A single user message.
#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub interactive: Option<Interactive>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct Interactive {
    #[serde(default)]
    pub list_reply: Option<ListReply>,
}

#[derive(Debug, Deserialize)]
pub struct ListReply {
    #[serde(default)]
    pub id: String,
}

impl WebhookMessage {
    /// Converts the message into an inbound event.
    ///
    /// Messages without text or a list reply (media, reactions, ...) become
    /// empty text events, which the gateway drops.
    #[must_use]
    pub fn into_event(self) -> InboundEvent {
        if let Some(reply) = self.interactive.and_then(|i| i.list_reply) {
            return InboundEvent::selected_option(self.id, self.from, reply.id);
        }
        let body = self.text.map(|t| t.body).unwrap_or_default();
        InboundEvent::text(self.id, self.from, body)
    }
}

impl WebhookPayload {
    /// Flattens every message of every change into inbound events.
    ///
    /// Messages without an id or a sender cannot be deduplicated or answered
    /// and are skipped without affecting the rest of the batch.
    #[must_use]
    pub fn into_events(self) -> Vec<InboundEvent> {
        self.entry
            .into_iter()
            .flat_map(|e| e.changes)
            .flat_map(|c| c.value.messages)
            .filter(|m| {
                let complete = !m.id.trim().is_empty() && !m.from.trim().is_empty();
                if !complete {
                    warn!(message_id = %m.id, "skipping webhook message without id or sender");
                }
                complete
            })
            .map(WebhookMessage::into_event)
            .collect()
    }
}

/// Builds the Graph API body for a plain text message.
fn text_message_body(to: &UserId, text: &str) -> JsonValue {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to.as_str(),
        "type": "text",
        "text": { "body": text },
    })
}

/// Builds the Graph API body for the interactive area selection list.
///
/// Row ids are the raw area names so a selection round-trips unchanged.
fn area_menu_body(to: &UserId, areas: &[String]) -> JsonValue {
    let rows: Vec<JsonValue> = areas
        .iter()
        .take(MAX_LIST_ROWS)
        .map(|area| json!({ "id": area, "title": row_title(area) }))
        .collect();
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to.as_str(),
        "type": "interactive",
        "interactive": {
            "type": "list",
            "header": { "type": "text", "text": "Selección de Servicio" },
            "body": { "text": "Por favor, selecciona el área con la que deseas contactar:" },
            "footer": { "text": "Selecciona una opción para continuar" },
            "action": {
                "button": "Ver Servicios",
                "sections": [{ "title": "Áreas de Servicio", "rows": rows }],
            },
        },
    })
}

fn row_title(area: &str) -> String {
    let mut chars = area.chars();
    let title: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    title.chars().take(MAX_ROW_TITLE_CHARS).collect()
}

/// Outbound sink posting to the WhatsApp Cloud API.
#[derive(Debug, Clone)]
pub struct WhatsAppSender {
    client: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppSender {
    /// Creates a sender with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: WhatsAppConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    async fn post(&self, body: &JsonValue) -> Result<(), OutboundError> {
        let response = self
            .client
            .post(self.config.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| OutboundError::SendFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutboundError::SendFailed {
                reason: format!("graph api returned {status}: {body}"),
            });
        }

        debug!("message accepted by graph api");
        Ok(())
    }
}

#[async_trait]
impl OutboundSink for WhatsAppSender {
    #[instrument(skip(self, text), fields(user_id = %user_id))]
    async fn send(&self, user_id: &UserId, text: &str) -> Result<(), OutboundError> {
        if text.trim().is_empty() {
            warn!("refusing to send empty message");
            return Ok(());
        }
        self.post(&text_message_body(user_id, text)).await
    }

    #[instrument(skip(self, areas), fields(user_id = %user_id, areas = areas.len()))]
    async fn send_area_menu(
        &self,
        user_id: &UserId,
        areas: &[String],
    ) -> Result<(), OutboundError> {
        if areas.is_empty() {
            warn!("refusing to send an empty area menu");
            return Ok(());
        }
        self.post(&area_menu_body(user_id, areas)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaydesk_assistant::InboundPayload;

    fn config() -> WhatsAppConfig {
        WhatsAppConfig {
            phone_number_id: "1234567890".to_string(),
            access_token: "EAAG".to_string(),
            api_version: default_api_version(),
            graph_base_url: "https://graph.facebook.com/".to_string(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    #[test]
    fn messages_url() {
        assert_eq!(
            config().messages_url(),
            "https://graph.facebook.com/v22.0/1234567890/messages"
        );
    }

    #[test]
    fn text_body_shape() {
        let body = text_message_body(&UserId::new("51987654321"), "Hola");
        assert_eq!(body["messaging_product"], "whatsapp");
        assert_eq!(body["to"], "51987654321");
        assert_eq!(body["type"], "text");
        assert_eq!(body["text"]["body"], "Hola");
    }

    #[test]
    fn area_menu_body_shape() {
        let areas = vec!["cobranzas".to_string(), "área comercial".to_string()];
        let body = area_menu_body(&UserId::new("51987654321"), &areas);

        assert_eq!(body["to"], "51987654321");
        assert_eq!(body["type"], "interactive");
        assert_eq!(body["interactive"]["type"], "list");
        assert_eq!(body["interactive"]["header"]["text"], "Selección de Servicio");
        assert_eq!(body["interactive"]["action"]["button"], "Ver Servicios");

        let section = &body["interactive"]["action"]["sections"][0];
        assert_eq!(section["title"], "Áreas de Servicio");
        assert_eq!(
            section["rows"],
            json!([
                { "id": "cobranzas", "title": "Cobranzas" },
                { "id": "área comercial", "title": "Área comercial" }
            ])
        );
    }

    #[test]
    fn area_menu_respects_list_limits() {
        let mut areas: Vec<String> = (0..12).map(|i| format!("area {i}")).collect();
        areas[0] = "atención al cliente corporativo".to_string();
        let body = area_menu_body(&UserId::new("51987654321"), &areas);

        let rows = body["interactive"]["action"]["sections"][0]["rows"]
            .as_array()
            .unwrap();
        assert_eq!(rows.len(), MAX_LIST_ROWS);
        assert_eq!(rows[0]["id"], "atención al cliente corporativo");
        assert_eq!(rows[0]["title"], "Atención al cliente corp");
    }

    #[test]
    fn message_without_sender_does_not_drop_batch() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "entry": [{ "changes": [{ "value": { "messages": [
                { "id": "wamid.8", "type": "text", "text": { "body": "sin remitente" } },
                { "from": "51987654321", "type": "text", "text": { "body": "sin id" } },
                { "id": "wamid.9", "from": "51987654321", "type": "text",
                  "text": { "body": "hola" } }
            ]}}]}]
        }))
        .unwrap();

        let events = payload.into_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message_id, "wamid.9");
        assert_eq!(events[0].payload, InboundPayload::Text("hola".to_string()));
    }

    #[test]
    fn parses_text_and_list_reply() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [
                            {
                                "id": "wamid.1",
                                "from": "51987654321",
                                "type": "text",
                                "text": { "body": "quiero hablar con cobranzas" }
                            },
                            {
                                "id": "wamid.2",
                                "from": "51987654321",
                                "type": "interactive",
                                "interactive": {
                                    "type": "list_reply",
                                    "list_reply": { "id": "retail", "title": "Retail" }
                                }
                            }
                        ]
                    }
                }]
            }]
        }))
        .unwrap();

        let events = payload.into_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message_id, "wamid.1");
        assert_eq!(
            events[0].payload,
            InboundPayload::Text("quiero hablar con cobranzas".to_string())
        );
        assert_eq!(
            events[1].payload,
            InboundPayload::SelectedOption("retail".to_string())
        );
    }

    #[test]
    fn media_message_becomes_empty_event() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "entry": [{ "changes": [{ "value": { "messages": [
                { "id": "wamid.3", "from": "51987654321", "type": "image", "image": {} }
            ]}}]}]
        }))
        .unwrap();

        let events = payload.into_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_empty());
    }

    #[test]
    fn status_callbacks_produce_no_events() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{ "changes": [{ "value": { "statuses": [{ "id": "wamid.1" }] } }] }]
        }))
        .unwrap();
        assert!(payload.into_events().is_empty());
    }

    #[tokio::test]
    async fn empty_message_is_not_sent() {
        let sender = WhatsAppSender::new(WhatsAppConfig {
            graph_base_url: "http://127.0.0.1:9".to_string(),
            ..config()
        })
        .unwrap();
        assert!(
            sender
                .send(&UserId::new("51987654321"), "   ")
                .await
                .is_ok()
        );
    }
}
