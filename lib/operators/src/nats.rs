//! NATS-backed notifier.
//!
//! Events are published with core NATS (no JetStream) to subjects like
//! `<prefix>.<target>.<event>`. Operator consoles subscribe to
//! `<prefix>.<operator_id>.>`.

use crate::error::NotifyError;
use crate::notifier::Notifier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

/// Default subject prefix.
const DEFAULT_SUBJECT_PREFIX: &str = "relaydesk.operators";

/// Configuration for the NATS notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatsNotifierConfig {
    /// NATS server URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Subject prefix for operator events.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_subject_prefix() -> String {
    DEFAULT_SUBJECT_PREFIX.to_string()
}

impl Default for NatsNotifierConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            subject_prefix: default_subject_prefix(),
        }
    }
}

impl NatsNotifierConfig {
    /// Returns the subject for an event addressed to `target_id`.
    #[must_use]
    pub fn subject(&self, target_id: &str, event_name: &str) -> String {
        format!("{}.{target_id}.{event_name}", self.subject_prefix)
    }
}

/// Publishes notifications over a NATS connection.
pub struct NatsNotifier {
    client: async_nats::Client,
    config: NatsNotifierConfig,
}

impl NatsNotifier {
    /// Connects to NATS.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(config: NatsNotifierConfig) -> Result<Self, NotifyError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| NotifyError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn from_client(client: async_nats::Client, config: NatsNotifierConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    #[instrument(skip(self, payload))]
    async fn publish(
        &self,
        target_id: &str,
        event_name: &str,
        payload: &JsonValue,
    ) -> Result<(), NotifyError> {
        let subject = self.config.subject(target_id, event_name);
        let bytes = serde_json::to_vec(payload).map_err(|e| NotifyError::EncodeFailed {
            reason: e.to_string(),
        })?;

        self.client
            .publish(subject.clone(), bytes.into())
            .await
            .map_err(|e| NotifyError::PublishFailed {
                subject: subject.clone(),
                reason: e.to_string(),
            })?;

        debug!(subject = %subject, "notification published");
        Ok(())
    }
}
