//! In-memory collaborators shared by the crate's tests.

use crate::assistant::Assistant;
use crate::config::AssistantConfig;
use crate::delegation::DELEGATION_TOOL_NAME;
use crate::error::{AssistantError, OutboundError};
use crate::gateway::OutboundSink;
use async_trait::async_trait;
use relaydesk_ai::{LlmBackend, LlmError, LlmRequest, LlmResponse, LlmToolCall};
use relaydesk_conversation::InMemoryConversationStore;
use relaydesk_core::{AreaId, UserId};
use relaydesk_operators::{Area, InMemoryOperatorDirectory, Notifier, NotifyError, Operator};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn call(id: &str, arguments: &str) -> LlmToolCall {
    LlmToolCall::new(id, DELEGATION_TOOL_NAME, arguments)
}

pub(crate) struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
    stall: bool,
}

impl ScriptedBackend {
    pub(crate) fn new(script: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            stall: false,
        }
    }

    /// A backend that never answers within any reasonable timeout.
    pub(crate) fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or(Err(LlmError::EmptyResponse))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

pub(crate) struct RecordingNotifier {
    published: Mutex<Vec<(String, String, JsonValue)>>,
    fail: bool,
    stall: bool,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: false,
            stall: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// A notifier whose publish never completes, like a wedged connection.
    pub(crate) fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::new()
        }
    }

    pub(crate) fn published(&self) -> Vec<(String, String, JsonValue)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(
        &self,
        target_id: &str,
        event_name: &str,
        payload: &JsonValue,
    ) -> Result<(), NotifyError> {
        if self.stall {
            tokio::time::sleep(Duration::from_secs(86_400)).await;
        }
        if self.fail {
            return Err(NotifyError::PublishFailed {
                subject: target_id.to_string(),
                reason: "no responders".to_string(),
            });
        }
        self.published.lock().unwrap().push((
            target_id.to_string(),
            event_name.to_string(),
            payload.clone(),
        ));
        Ok(())
    }
}

pub(crate) struct RecordingSink {
    sent: Mutex<Vec<(UserId, String)>>,
    menus: Mutex<Vec<(UserId, Vec<String>)>>,
    fail: bool,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            menus: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn menus(&self) -> Vec<(UserId, Vec<String>)> {
        self.menus.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutboundSink for RecordingSink {
    async fn send(&self, user_id: &UserId, text: &str) -> Result<(), OutboundError> {
        if self.fail {
            return Err(OutboundError::SendFailed {
                reason: "graph api unreachable".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id.clone(), text.to_string()));
        Ok(())
    }

    async fn send_area_menu(
        &self,
        user_id: &UserId,
        areas: &[String],
    ) -> Result<(), OutboundError> {
        if self.fail {
            return Err(OutboundError::SendFailed {
                reason: "graph api unreachable".to_string(),
            });
        }
        self.menus
            .lock()
            .unwrap()
            .push((user_id.clone(), areas.to_vec()));
        Ok(())
    }
}

/// An assistant wired to in-memory collaborators.
pub(crate) struct Harness {
    pub(crate) assistant: Arc<Assistant>,
    pub(crate) store: Arc<InMemoryConversationStore>,
    pub(crate) directory: Arc<InMemoryOperatorDirectory>,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) backend: Arc<ScriptedBackend>,
    areas: Mutex<HashMap<String, AreaId>>,
}

impl Harness {
    pub(crate) fn new(script: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self::build(ScriptedBackend::new(script), RecordingNotifier::new())
    }

    pub(crate) fn with_backend(backend: ScriptedBackend) -> Self {
        Self::build(backend, RecordingNotifier::new())
    }

    pub(crate) fn build(backend: ScriptedBackend, notifier: RecordingNotifier) -> Self {
        Self::assemble(backend, notifier, AssistantConfig::default()).unwrap()
    }

    pub(crate) fn try_with_config(config: AssistantConfig) -> Result<Self, AssistantError> {
        Self::assemble(ScriptedBackend::new(Vec::new()), RecordingNotifier::new(), config)
    }

    fn assemble(
        backend: ScriptedBackend,
        notifier: RecordingNotifier,
        config: AssistantConfig,
    ) -> Result<Self, AssistantError> {
        let store = Arc::new(InMemoryConversationStore::new());
        let directory = Arc::new(InMemoryOperatorDirectory::new());
        let notifier = Arc::new(notifier);
        let backend = Arc::new(backend);
        let assistant = Assistant::new(
            store.clone(),
            directory.clone(),
            notifier.clone(),
            backend.clone(),
            config,
        )?;
        Ok(Self {
            assistant: Arc::new(assistant),
            store,
            directory,
            notifier,
            backend,
            areas: Mutex::new(HashMap::new()),
        })
    }

    /// Registers an available operator, creating the area on first use.
    pub(crate) fn add_operator(&self, area_name: &str, display_name: &str) -> Operator {
        let area_id = *self
            .areas
            .lock()
            .unwrap()
            .entry(area_name.to_string())
            .or_insert_with(|| {
                let area = Area::new(area_name);
                let id = area.id;
                self.directory.add_area(area);
                id
            });
        let operator = Operator::new(display_name, area_id, "51900000000");
        self.directory.add_operator(operator.clone());
        operator
    }
}
