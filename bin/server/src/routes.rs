//! HTTP routes.
//!
//! The webhook acknowledges every delivery with 200 and processes its events
//! in the background, so the channel never retries because of a slow model
//! call. Redeliveries that do happen are absorbed by the gateway's dedup gate.
//! Events of one delivery are handled in order by a single task, so two
//! messages from the same user never race on that user's conversation.

use crate::error::ApiError;
use crate::whatsapp::WebhookPayload;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use relaydesk_assistant::{AssistantError, InboundGateway};
use relaydesk_conversation::{ConversationSummary, Turn};
use relaydesk_core::{OperatorId, UserId};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<InboundGateway>,
}

impl AppState {
    #[must_use]
    pub fn new(gateway: Arc<InboundGateway>) -> Self {
        Self { gateway }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(receive_webhook))
        .route(
            "/api/conversations/{user_id}/history",
            get(conversation_history),
        )
        .route(
            "/api/operators/{operator_id}/pending",
            get(pending_assignments),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "ignoring unparseable webhook body");
            return StatusCode::OK;
        }
    };

    let events = payload.into_events();
    debug!(events = events.len(), "webhook received");
    if events.is_empty() {
        return StatusCode::OK;
    }
    let gateway = state.gateway.clone();
    tokio::spawn(async move {
        for event in events {
            gateway.handle_inbound_message(event).await;
        }
    });
    StatusCode::OK
}

fn internal(e: AssistantError) -> ApiError {
    ApiError::Internal {
        details: e.to_string(),
    }
}

async fn conversation_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Turn>>, ApiError> {
    let user_id = UserId::from_str(&user_id).map_err(|e| ApiError::BadRequest {
        message: e.to_string(),
    })?;
    let history = state
        .gateway
        .assistant()
        .get_history(&user_id)
        .await
        .map_err(internal)?;
    Ok(Json(history))
}

async fn pending_assignments(
    State(state): State<AppState>,
    Path(operator_id): Path<String>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let operator_id = OperatorId::from_str(&operator_id).map_err(|e| ApiError::BadRequest {
        message: e.to_string(),
    })?;
    let pending = state
        .gateway
        .assistant()
        .get_pending_assignments(operator_id)
        .await
        .map_err(internal)?;
    Ok(Json(pending))
}

async fn health() -> &'static str {
    "ok"
}
