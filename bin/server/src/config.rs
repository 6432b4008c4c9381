//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`LLM__MODEL`, `ASSISTANT__AREAS`, ...).
//! Library crates own their config structs; this module composes them.

use crate::whatsapp::WhatsAppConfig;
use config::Environment;
use relaydesk_ai::LlmBackendConfig;
use relaydesk_assistant::AssistantConfig;
use relaydesk_operators::NatsNotifierConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Language-model backend.
    #[serde(default)]
    pub llm: LlmBackendConfig,

    /// WhatsApp Cloud API credentials.
    pub whatsapp: WhatsAppConfig,

    /// Real-time notification channel.
    #[serde(default)]
    pub nats: NatsNotifierConfig,

    /// Assistant behavior.
    #[serde(default)]
    pub assistant: AssistantConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(Self::environment())
    }

    fn environment() -> Environment {
        Environment::default()
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("assistant.areas")
            .with_list_parse_key("assistant.menu_keywords")
    }

    fn from_environment(environment: Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }
}
