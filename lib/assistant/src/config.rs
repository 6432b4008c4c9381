//! Assistant configuration.

use crate::error::AssistantError;
use chrono_tz::Tz;
use relaydesk_conversation::{DEFAULT_DEDUP_CAPACITY, DEFAULT_HISTORY_WINDOW, TimeContextBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the assistant state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Number of recent turns fed to the backend.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Notification target used when no operator could be assigned.
    #[serde(default = "default_fallback_target")]
    pub fallback_target: String,

    /// Areas the model may delegate to.
    #[serde(default = "default_areas")]
    pub areas: Vec<String>,

    /// Words that make the gateway answer with the area menu instead of
    /// the model. Matched case-insensitively as substrings; empty disables
    /// the menu.
    #[serde(default = "default_menu_keywords")]
    pub menu_keywords: Vec<String>,

    /// IANA zone used for the time context.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Upper bound on each backend call.
    #[serde(default = "default_backend_timeout_seconds")]
    pub backend_timeout_seconds: u64,

    /// Upper bound on each operator notification.
    #[serde(default = "default_notify_timeout_seconds")]
    pub notify_timeout_seconds: u64,

    /// Number of inbound message ids remembered for deduplication.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Fixed system instruction; the time context is appended to it.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

fn default_fallback_target() -> String {
    "unassigned".to_string()
}

fn default_areas() -> Vec<String> {
    ["cobranzas", "retail", "telecomunicaciones", "financiero"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_menu_keywords() -> Vec<String> {
    ["contactar", "área", "area"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timezone() -> String {
    "America/Lima".to_string()
}

fn default_backend_timeout_seconds() -> u64 {
    30
}

fn default_notify_timeout_seconds() -> u64 {
    5
}

fn default_dedup_capacity() -> usize {
    DEFAULT_DEDUP_CAPACITY
}

fn default_system_prompt() -> String {
    "Eres el asistente virtual de WhatsApp de CobranzaExpress S.A., empresa de servicios de \
     cobranza para empresas de retail, telecomunicaciones y servicios financieros. Atiende \
     consultas de clientes y contactos interesados con respuestas breves, claras y amables. \
     Cuando el usuario quiera hablar con un asesor o con un área específica, llama a la \
     función derivar_area con el área correspondiente e incluye su RUC y número de acta si \
     los mencionó."
        .to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            fallback_target: default_fallback_target(),
            areas: default_areas(),
            menu_keywords: default_menu_keywords(),
            timezone: default_timezone(),
            backend_timeout_seconds: default_backend_timeout_seconds(),
            notify_timeout_seconds: default_notify_timeout_seconds(),
            dedup_capacity: default_dedup_capacity(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl AssistantConfig {
    /// Returns the per-call backend timeout.
    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_seconds)
    }

    /// Returns the per-notification timeout.
    #[must_use]
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_seconds)
    }

    /// Returns true if `area` is one of the configured areas.
    #[must_use]
    pub fn knows_area(&self, area: &str) -> bool {
        self.areas.iter().any(|a| a.eq_ignore_ascii_case(area.trim()))
    }

    /// Returns true if `text` asks for the area menu.
    #[must_use]
    pub fn wants_area_menu(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.menu_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && text.contains(&k))
    }

    /// Builds the time context renderer for the configured zone.
    ///
    /// # Errors
    ///
    /// Returns an error if `timezone` is not a known IANA zone.
    pub fn time_context(&self) -> Result<TimeContextBuilder, AssistantError> {
        let tz: Tz = self
            .timezone
            .parse()
            .map_err(|e| AssistantError::InvalidConfig {
                reason: format!("unknown timezone '{}': {e}", self.timezone),
            })?;
        Ok(TimeContextBuilder::new(tz))
    }
}
