//! Real-time assignment notifications.

use crate::error::NotifyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relaydesk_core::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Event name used for assignment pushes.
pub const NEW_ASSIGNMENT_EVENT: &str = "new_assignment";

/// Payload pushed to an operator when a conversation is delegated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentNotification {
    pub area: String,
    pub message: String,
    pub ruc: Option<String>,
    pub acta_number: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
}

impl AssignmentNotification {
    /// Encodes the payload for publishing.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_payload(&self) -> Result<JsonValue, NotifyError> {
        serde_json::to_value(self).map_err(|e| NotifyError::EncodeFailed {
            reason: e.to_string(),
        })
    }
}

/// Fire-and-forget publisher to a real-time channel.
///
/// Callers log and swallow errors; a failed push never aborts a turn.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publishes `payload` as `event_name` to `target_id`.
    async fn publish(
        &self,
        target_id: &str,
        event_name: &str,
        payload: &JsonValue,
    ) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_field_names() {
        let notification = AssignmentNotification {
            area: "cobranzas".to_string(),
            message: "Has seleccionado el área de cobranzas.".to_string(),
            ruc: Some("12345678901".to_string()),
            acta_number: None,
            user_id: UserId::new("51987654321"),
            timestamp: Utc::now(),
        };

        let payload = notification.to_payload().expect("encode");
        assert_eq!(payload["ruc"], "12345678901");
        assert_eq!(payload["userId"], "51987654321");
        assert!(payload["acta_number"].is_null());
    }
}
