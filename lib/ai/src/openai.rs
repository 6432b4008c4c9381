//! OpenAI-compatible chat-completions backend.
//!
//! Works against any endpoint exposing `POST {base_url}/chat/completions`
//! with function calling (OpenRouter, OpenAI, self-hosted gateways).

use crate::backend::{LlmBackend, LlmMessage, LlmRequest, LlmResponse, LlmToolCall, MessageRole, TokenUsage};
use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Configuration for an OpenAI-compatible backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    /// Base URL for the API, without the `/chat/completions` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (if required).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "deepseek/deepseek-chat".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    300
}

impl Default for LlmBackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmBackendConfig {
    /// Returns the per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
}

impl OpenAiCompatibleBackend {
    /// Creates a backend with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: LlmBackendConfig) -> Result<Self, LlmError> {
        if config.base_url.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "base_url must not be empty".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LlmBackendConfig {
        &self.config
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    #[instrument(skip(self, request), fields(model = %self.config.model, tools = request.tools.len()))]
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = self.config.completions_url();
        let body = request_body(&self.config, request);

        let mut builder = self.client.post(&url).json(&body);
        if let Some(api_key) = self.config.api_key.as_deref()
            && !api_key.is_empty()
        {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, endpoint = %url, "chat completion request failed");
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::RequestFailed {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(LlmError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "chat completion endpoint returned error");
            return Err(LlmError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                }
            }
        })?;
        let parsed = parse_completion(&text)?;
        debug!(
            tool_calls = parsed.tool_calls.len(),
            total_tokens = parsed.usage.total(),
            "chat completion received"
        );
        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

fn role_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

fn message_json(message: &LlmMessage) -> JsonValue {
    match message.role {
        MessageRole::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<JsonValue> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.name, "arguments": call.arguments },
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                JsonValue::Null
            } else {
                JsonValue::String(message.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        MessageRole::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.as_deref().unwrap_or_default(),
            "content": message.content,
        }),
        role => json!({ "role": role_str(role), "content": message.content }),
    }
}

/// Builds the chat-completions request body.
pub(crate) fn request_body(config: &LlmBackendConfig, request: &LlmRequest) -> JsonValue {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request.system.as_deref() {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.extend(request.messages.iter().map(message_json));

    let mut body = json!({
        "model": config.model,
        "messages": messages,
        "temperature": request.temperature.unwrap_or(config.temperature),
        "max_tokens": request.max_tokens.unwrap_or(config.max_tokens),
    });
    if !request.tools.is_empty() {
        body["tools"] = request
            .tools
            .iter()
            .map(|t| t.to_function_json())
            .collect::<Vec<_>>()
            .into();
        body["tool_choice"] = json!("auto");
    }
    body
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Parses a chat-completions response body, honoring only the first choice.
pub(crate) fn parse_completion(body: &str) -> Result<LlmResponse, LlmError> {
    let completion: ChatCompletion =
        serde_json::from_str(body).map_err(|e| LlmError::ResponseParseFailed {
            reason: e.to_string(),
        })?;

    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?;

    let tool_calls: Vec<LlmToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| LlmToolCall::new(call.id, call.function.name, call.function.arguments))
        .collect();
    let content = choice.message.content.filter(|c| !c.trim().is_empty());

    if content.is_none() && tool_calls.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    Ok(LlmResponse {
        content,
        tool_calls,
        usage: completion
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default(),
        model: completion.model,
    })
}
