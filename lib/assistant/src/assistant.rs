//! The assistant state machine.
//!
//! Each inbound utterance moves through
//! `Received -> HistoryLoaded -> FirstModelCallPending` and then either ends
//! with a direct reply, or runs the delegation effect and a second,
//! tool-free model call whose text becomes the reply. Every backend call is
//! bounded by the configured timeout.

use crate::config::AssistantConfig;
use crate::delegation::{DELEGATION_TOOL_NAME, DelegationArgs, delegation_tool};
use crate::error::AssistantError;
use crate::prompt;
use chrono::Utc;
use relaydesk_ai::{LlmBackend, LlmMessage, LlmRequest, LlmResponse, ToolDefinition};
use relaydesk_conversation::{
    AppendOutcome, ConversationStore, ConversationSummary, TimeContextBuilder, Turn,
    build_prompt_sequence,
};
use relaydesk_core::{OperatorId, UserId};
use relaydesk_operators::{
    AssignmentNotification, NEW_ASSIGNMENT_EVENT, Notifier, Operator, OperatorDirectory,
    select_operator,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Result of running the delegation effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub args: DelegationArgs,
    /// The assigned operator; `None` when nobody was available.
    pub operator: Option<Operator>,
    /// Hand-off text for the user.
    pub acknowledgement: String,
}

/// Drives one utterance at a time against injected collaborators.
pub struct Assistant {
    store: Arc<dyn ConversationStore>,
    directory: Arc<dyn OperatorDirectory>,
    notifier: Arc<dyn Notifier>,
    backend: Arc<dyn LlmBackend>,
    time_context: TimeContextBuilder,
    tools: Vec<ToolDefinition>,
    config: AssistantConfig,
}

impl Assistant {
    /// Creates an assistant.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        directory: Arc<dyn OperatorDirectory>,
        notifier: Arc<dyn Notifier>,
        backend: Arc<dyn LlmBackend>,
        config: AssistantConfig,
    ) -> Result<Self, AssistantError> {
        let time_context = config.time_context()?;
        let tools = vec![delegation_tool(&config.areas)];
        Ok(Self {
            store,
            directory,
            notifier,
            backend,
            time_context,
            tools,
            config,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Processes one user utterance and returns the reply to send.
    ///
    /// The user turn is persisted first and is never rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::InvalidToolArguments`] or
    /// [`AssistantError::UpstreamResponseMalformed`] when the utterance is
    /// aborted, and [`AssistantError::Store`] when persistence fails.
    #[instrument(skip(self, text), fields(user_id = %user_id))]
    pub async fn respond(&self, user_id: &UserId, text: &str) -> Result<String, AssistantError> {
        let last_contact = self
            .store
            .summary(user_id)
            .await?
            .map(|s| s.last_contact_at);

        if self.store.append_turn(user_id, Turn::user(text)).await? == AppendOutcome::NoOp {
            debug!("user turn repeats the last stored turn");
        }

        let window = self
            .store
            .recent_turns(user_id, self.config.history_window)
            .await?;
        let messages = prompt::to_messages(&build_prompt_sequence(&window));
        let system = prompt::system_preamble(
            &self.config.system_prompt,
            &self.time_context.build(last_contact),
        );
        debug!(window = window.len(), messages = messages.len(), "history loaded");

        let request = LlmRequest::new(messages.clone())
            .with_system(system.clone())
            .with_tools(self.tools.clone());
        let first = self.complete(&request, "first").await?;

        let Some(call) = first.first_tool_call().cloned() else {
            let reply = reply_text(&first, "first")?;
            self.store
                .append_turn(user_id, Turn::assistant(reply.clone()))
                .await?;
            debug!("replied directly");
            return Ok(reply);
        };

        if first.tool_calls.len() > 1 {
            warn!(
                ignored = first.tool_calls.len() - 1,
                "only the first tool call is honored"
            );
        }
        if call.id.trim().is_empty() {
            error!("tool call without id");
            return Err(AssistantError::UpstreamResponseMalformed {
                reason: "tool call without id".to_string(),
            });
        }
        if call.name != DELEGATION_TOOL_NAME {
            error!(function = %call.name, "model called an unknown function");
            return Err(AssistantError::InvalidToolArguments {
                reason: format!("unknown function '{}'", call.name),
            });
        }
        let args = DelegationArgs::parse(&call.arguments).inspect_err(|e| {
            error!(error = %e, arguments = %call.arguments, "aborting utterance");
        })?;
        debug!(area = %args.area, "tool requested");

        let delegation = self.delegate(user_id, args).await?;

        let call_content = first.content.clone().unwrap_or_default();
        self.store
            .append_turn(
                user_id,
                Turn::assistant_with_tools(
                    call_content.clone(),
                    vec![prompt::tool_invocation(&call)],
                ),
            )
            .await?;
        self.store
            .append_turn(
                user_id,
                Turn::tool(call.id.clone(), delegation.acknowledgement.clone()),
            )
            .await?;
        debug!("tool executed");

        let mut follow_up = messages;
        follow_up.push(LlmMessage::assistant_with_calls(
            call_content,
            vec![call.clone()],
        ));
        follow_up.push(LlmMessage::tool(
            call.id.clone(),
            delegation.acknowledgement.clone(),
        ));
        let second = self
            .complete(&LlmRequest::new(follow_up).with_system(system), "second")
            .await?;

        let reply = reply_text(&second, "second")?;
        self.store
            .append_turn(user_id, Turn::assistant(reply.clone()))
            .await?;
        Ok(reply)
    }

    /// Records a request for the area menu and returns the areas to offer.
    ///
    /// The text is stored as a user turn; the menu itself is not part of
    /// the conversation log and the backend is not called.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Store`] when persistence fails.
    #[instrument(skip(self, text), fields(user_id = %user_id))]
    pub async fn request_area_menu(
        &self,
        user_id: &UserId,
        text: &str,
    ) -> Result<Vec<String>, AssistantError> {
        self.store.append_turn(user_id, Turn::user(text)).await?;
        debug!(areas = self.config.areas.len(), "area menu requested");
        Ok(self.config.areas.clone())
    }

    /// Processes an interactive area selection without calling the backend.
    ///
    /// The option id is stored as the user turn and the acknowledgement as
    /// the assistant turn; no tool turns are written.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Store`] when persistence fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn respond_to_selection(
        &self,
        user_id: &UserId,
        option_id: &str,
    ) -> Result<String, AssistantError> {
        let area = option_id.trim();
        self.store.append_turn(user_id, Turn::user(area)).await?;

        let delegation = self
            .delegate(user_id, DelegationArgs::area_only(area))
            .await?;

        self.store
            .append_turn(user_id, Turn::assistant(delegation.acknowledgement.clone()))
            .await?;
        Ok(delegation.acknowledgement)
    }

    /// Runs the delegation effect: operator lookup and selection, assignment
    /// bookkeeping, and a best-effort notification.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Store`] when the bookkeeping cannot be
    /// persisted. A missing operator or a failed notification is not an
    /// error.
    #[instrument(skip(self, args), fields(user_id = %user_id, area = %args.area))]
    pub async fn delegate(
        &self,
        user_id: &UserId,
        args: DelegationArgs,
    ) -> Result<Delegation, AssistantError> {
        let candidates = self.candidates(&args.area).await;
        let operator = select_operator(&candidates).cloned();

        self.store.mark_delegated(user_id, &args.area).await?;
        match &operator {
            Some(op) => {
                self.store.assign_advisor(user_id, op.id).await?;
                info!(operator_id = %op.id, candidates = candidates.len(), "conversation assigned");
            }
            None => warn!("no operator available"),
        }

        let acknowledgement = args.acknowledgement(operator.as_ref());
        let target = operator
            .as_ref()
            .map(Operator::notification_target)
            .unwrap_or_else(|| self.config.fallback_target.clone());
        self.notify(
            &target,
            &AssignmentNotification {
                area: args.area.clone(),
                message: acknowledgement.clone(),
                ruc: args.ruc.clone(),
                acta_number: args.acta_number.clone(),
                user_id: user_id.clone(),
                timestamp: Utc::now(),
            },
        )
        .await;

        Ok(Delegation {
            args,
            operator,
            acknowledgement,
        })
    }

    /// Returns the full ordered history of a user's conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Store`] when the store fails.
    pub async fn get_history(&self, user_id: &UserId) -> Result<Vec<Turn>, AssistantError> {
        Ok(self.store.get_history(user_id).await?)
    }

    /// Returns conversations waiting on `operator_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Store`] when the store fails.
    pub async fn get_pending_assignments(
        &self,
        operator_id: OperatorId,
    ) -> Result<Vec<ConversationSummary>, AssistantError> {
        Ok(self.store.pending_assignments(operator_id).await?)
    }

    async fn complete(
        &self,
        request: &LlmRequest,
        phase: &'static str,
    ) -> Result<LlmResponse, AssistantError> {
        match tokio::time::timeout(self.config.backend_timeout(), self.backend.complete(request))
            .await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                error!(phase, error = %e, "backend call failed");
                Err(AssistantError::UpstreamResponseMalformed {
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                error!(phase, timeout_seconds = self.config.backend_timeout_seconds, "backend call timed out");
                Err(AssistantError::UpstreamResponseMalformed {
                    reason: format!("{phase} backend call timed out"),
                })
            }
        }
    }

    async fn candidates(&self, area: &str) -> Vec<Operator> {
        if !self.config.knows_area(area) {
            warn!(area = %area, "area is not configured");
            return Vec::new();
        }
        let area_id = match self.directory.find_area(area).await {
            Ok(Some(found)) => found.id,
            Ok(None) => {
                warn!(area = %area, "area unknown to the directory");
                return Vec::new();
            }
            Err(e) => {
                warn!(area = %area, error = %e, "area lookup failed");
                return Vec::new();
            }
        };
        self.directory
            .find_available(Some(area_id))
            .await
            .unwrap_or_else(|e| {
                warn!(area = %area, error = %e, "operator lookup failed");
                Vec::new()
            })
    }

    async fn notify(&self, target: &str, notification: &AssignmentNotification) {
        let payload = match notification.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target = %target, error = %e, "assignment notification failed");
                return;
            }
        };
        let publish = self.notifier.publish(target, NEW_ASSIGNMENT_EVENT, &payload);
        match tokio::time::timeout(self.config.notify_timeout(), publish).await {
            Ok(Ok(())) => debug!(target = %target, "assignment notification published"),
            Ok(Err(e)) => {
                warn!(target = %target, error = %e, "assignment notification failed");
            }
            Err(_) => warn!(
                target = %target,
                timeout_seconds = self.config.notify_timeout_seconds,
                "assignment notification timed out"
            ),
        }
    }
}

fn reply_text(response: &LlmResponse, phase: &'static str) -> Result<String, AssistantError> {
    response
        .text_content()
        .map(str::to_string)
        .ok_or_else(|| {
            error!(phase, "backend returned no content");
            AssistantError::UpstreamResponseMalformed {
                reason: format!("{phase} backend call returned no content"),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, RecordingNotifier, ScriptedBackend, call};
    use relaydesk_ai::{LlmError, MessageRole};
    use relaydesk_conversation::TurnRole;

    fn user() -> UserId {
        UserId::new("51987654321")
    }

    fn roles(history: &[Turn]) -> Vec<TurnRole> {
        history.iter().map(Turn::role).collect()
    }

    #[tokio::test]
    async fn direct_reply_is_persisted() {
        let harness = Harness::new(vec![Ok(LlmResponse::text("Hola, ¿en qué te ayudo?"))]);

        let reply = harness.assistant.respond(&user(), "hola").await.unwrap();

        assert_eq!(reply, "Hola, ¿en qué te ayudo?");
        let history = harness.assistant.get_history(&user()).await.unwrap();
        assert_eq!(roles(&history), vec![TurnRole::User, TurnRole::Assistant]);
        assert!(harness.notifier.published().is_empty());

        let requests = harness.backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tools.len(), 1);
        assert!(
            requests[0]
                .system
                .as_deref()
                .is_some_and(|s| s.contains("sin contacto previo"))
        );
    }

    #[tokio::test]
    async fn delegation_to_cobranzas_with_ruc() {
        let harness = Harness::new(vec![
            Ok(LlmResponse::calls(vec![call(
                "call_1",
                r#"{"area":"cobranzas","ruc":"12345678901"}"#,
            )])),
            Ok(LlmResponse::text("Listo, un asesor de cobranzas te escribirá.")),
        ]);
        let ana = harness.add_operator("cobranzas", "Ana");

        let reply = harness
            .assistant
            .respond(&user(), "quiero hablar con cobranzas, mi RUC es 12345678901")
            .await
            .unwrap();

        assert_eq!(reply, "Listo, un asesor de cobranzas te escribirá.");

        let published = harness.notifier.published();
        assert_eq!(published.len(), 1);
        let (target, event, payload) = &published[0];
        assert_eq!(target, &ana.id.to_string());
        assert_eq!(event, "new_assignment");
        assert_eq!(payload["ruc"], "12345678901");
        assert_eq!(payload["area"], "cobranzas");
        assert_eq!(payload["userId"], "51987654321");

        let summary = harness.store.summary(&user()).await.unwrap().unwrap();
        assert_eq!(summary.assigned_advisor, Some(ana.id));
        assert_eq!(summary.assigned_area.as_deref(), Some("cobranzas"));
        assert!(summary.needs_human_response);

        let history = harness.assistant.get_history(&user()).await.unwrap();
        assert_eq!(
            roles(&history),
            vec![
                TurnRole::User,
                TurnRole::Assistant,
                TurnRole::Tool,
                TurnRole::Assistant
            ]
        );
        assert_eq!(history[1].tool_invocations()[0].id, "call_1");
        assert_eq!(history[2].tool_call_id(), Some("call_1"));
        assert!(history[2].content().contains("Tu asesor Ana"));

        let requests = harness.backend.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].tools.is_empty());
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.role, MessageRole::Tool);
        assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));

        let pending = harness
            .assistant
            .get_pending_assignments(ana.id)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].user_id, user());
    }

    #[tokio::test]
    async fn no_operator_still_acknowledges() {
        let harness = Harness::new(vec![
            Ok(LlmResponse::calls(vec![call("call_1", r#"{"area":"retail"}"#)])),
            Ok(LlmResponse::text("Te derivo con retail.")),
        ]);

        let reply = harness
            .assistant
            .respond(&user(), "quiero hablar con retail")
            .await
            .unwrap();

        assert!(!reply.is_empty());
        let published = harness.notifier.published();
        assert_eq!(published[0].0, "unassigned");

        let history = harness.assistant.get_history(&user()).await.unwrap();
        assert!(history[2].content().contains("Un asesor se pondrá en contacto"));

        let summary = harness.store.summary(&user()).await.unwrap().unwrap();
        assert!(summary.needs_human_response);
        assert_eq!(summary.assigned_advisor, None);
    }

    #[tokio::test]
    async fn unconfigured_area_follows_no_operator_path() {
        let harness = Harness::new(vec![
            Ok(LlmResponse::calls(vec![call("call_1", r#"{"area":"legal"}"#)])),
            Ok(LlmResponse::text("Te derivo.")),
        ]);
        harness.add_operator("legal", "Luis");

        harness.assistant.respond(&user(), "legal").await.unwrap();

        assert_eq!(harness.notifier.published()[0].0, "unassigned");
    }

    #[tokio::test]
    async fn invalid_tool_arguments_abort_after_user_turn() {
        let harness = Harness::new(vec![Ok(LlmResponse::calls(vec![call(
            "call_1",
            "{\"area\":",
        )]))]);
        harness.add_operator("cobranzas", "Ana");

        let err = harness
            .assistant
            .respond(&user(), "cobranzas")
            .await
            .unwrap_err();

        assert!(matches!(err, AssistantError::InvalidToolArguments { .. }));
        let history = harness.assistant.get_history(&user()).await.unwrap();
        assert_eq!(roles(&history), vec![TurnRole::User]);
        assert!(harness.notifier.published().is_empty());
        let summary = harness.store.summary(&user()).await.unwrap().unwrap();
        assert!(!summary.needs_human_response);
    }

    #[tokio::test]
    async fn malformed_upstream_aborts_after_user_turn() {
        let harness = Harness::new(vec![Err(LlmError::EmptyResponse)]);

        let err = harness.assistant.respond(&user(), "hola").await.unwrap_err();

        assert!(matches!(err, AssistantError::UpstreamResponseMalformed { .. }));
        let history = harness.assistant.get_history(&user()).await.unwrap();
        assert_eq!(roles(&history), vec![TurnRole::User]);
    }

    #[tokio::test]
    async fn blank_direct_reply_is_malformed() {
        let harness = Harness::new(vec![Ok(LlmResponse::text("   "))]);
        let err = harness.assistant.respond(&user(), "hola").await.unwrap_err();
        assert!(matches!(err, AssistantError::UpstreamResponseMalformed { .. }));
    }

    #[tokio::test]
    async fn second_call_failure_keeps_tool_turns() {
        let harness = Harness::new(vec![
            Ok(LlmResponse::calls(vec![call("call_1", r#"{"area":"retail"}"#)])),
            Err(LlmError::Timeout),
        ]);

        let err = harness.assistant.respond(&user(), "retail").await.unwrap_err();

        assert!(matches!(err, AssistantError::UpstreamResponseMalformed { .. }));
        let history = harness.assistant.get_history(&user()).await.unwrap();
        assert_eq!(
            roles(&history),
            vec![TurnRole::User, TurnRole::Assistant, TurnRole::Tool]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let harness = Harness::with_backend(ScriptedBackend::stalled());

        let err = harness.assistant.respond(&user(), "hola").await.unwrap_err();

        match err {
            AssistantError::UpstreamResponseMalformed { reason } => {
                assert!(reason.contains("timed out"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn only_first_tool_call_is_honored() {
        let harness = Harness::new(vec![
            Ok(LlmResponse::calls(vec![
                call("call_1", r#"{"area":"retail"}"#),
                call("call_2", r#"{"area":"cobranzas"}"#),
            ])),
            Ok(LlmResponse::text("Te derivo con retail.")),
        ]);

        harness.assistant.respond(&user(), "ayuda").await.unwrap();

        let published = harness.notifier.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].2["area"], "retail");
        let history = harness.assistant.get_history(&user()).await.unwrap();
        assert_eq!(history[1].tool_invocations().len(), 1);
    }

    #[tokio::test]
    async fn notification_failure_is_swallowed() {
        let harness = Harness::build(
            ScriptedBackend::new(vec![
                Ok(LlmResponse::calls(vec![call("call_1", r#"{"area":"cobranzas"}"#)])),
                Ok(LlmResponse::text("Listo.")),
            ]),
            RecordingNotifier::failing(),
        );
        harness.add_operator("cobranzas", "Ana");

        let reply = harness.assistant.respond(&user(), "cobranzas").await.unwrap();
        assert_eq!(reply, "Listo.");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_notification_does_not_block_reply() {
        let harness = Harness::build(
            ScriptedBackend::new(vec![
                Ok(LlmResponse::calls(vec![call("call_1", r#"{"area":"cobranzas"}"#)])),
                Ok(LlmResponse::text("Listo.")),
            ]),
            RecordingNotifier::stalled(),
        );
        harness.add_operator("cobranzas", "Ana");

        let reply = tokio::time::timeout(
            std::time::Duration::from_secs(3600),
            harness.assistant.respond(&user(), "cobranzas"),
        )
        .await
        .expect("utterance must not wait on the notifier")
        .unwrap();

        assert_eq!(reply, "Listo.");
        let history = harness.assistant.get_history(&user()).await.unwrap();
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn redelegation_without_operator_clears_previous_advisor() {
        let harness = Harness::new(Vec::new());
        let ana = harness.add_operator("cobranzas", "Ana");

        harness
            .assistant
            .respond_to_selection(&user(), "cobranzas")
            .await
            .unwrap();
        assert_eq!(harness.assistant.get_pending_assignments(ana.id).await.unwrap().len(), 1);

        harness
            .assistant
            .respond_to_selection(&user(), "retail")
            .await
            .unwrap();

        let summary = harness.store.summary(&user()).await.unwrap().unwrap();
        assert_eq!(summary.assigned_area.as_deref(), Some("retail"));
        assert_eq!(summary.assigned_advisor, None);
        assert!(harness.assistant.get_pending_assignments(ana.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn area_menu_request_is_logged_without_backend() {
        let harness = Harness::new(Vec::new());

        let areas = harness
            .assistant
            .request_area_menu(&user(), "quiero contactar un área")
            .await
            .unwrap();

        assert_eq!(areas, AssistantConfig::default().areas);
        assert!(harness.backend.requests().is_empty());
        let history = harness.assistant.get_history(&user()).await.unwrap();
        assert_eq!(roles(&history), vec![TurnRole::User]);
    }

    #[tokio::test]
    async fn selection_delegates_without_backend() {
        let harness = Harness::new(Vec::new());
        let beto = harness.add_operator("telecomunicaciones", "Beto");

        let reply = harness
            .assistant
            .respond_to_selection(&user(), "telecomunicaciones")
            .await
            .unwrap();

        assert!(reply.starts_with("Has seleccionado el área de telecomunicaciones."));
        assert!(harness.backend.requests().is_empty());
        let history = harness.assistant.get_history(&user()).await.unwrap();
        assert_eq!(roles(&history), vec![TurnRole::User, TurnRole::Assistant]);
        assert_eq!(history[0].content(), "telecomunicaciones");
        assert_eq!(harness.notifier.published()[0].0, beto.id.to_string());
        assert!(harness.notifier.published()[0].2["ruc"].is_null());
    }

    #[tokio::test]
    async fn follow_up_prompt_carries_last_contact() {
        let harness = Harness::new(vec![
            Ok(LlmResponse::text("Hola")),
            Ok(LlmResponse::text("Claro")),
        ]);

        harness.assistant.respond(&user(), "hola").await.unwrap();
        harness.assistant.respond(&user(), "una consulta").await.unwrap();

        let requests = harness.backend.requests();
        let system = requests[1].system.as_deref().unwrap();
        assert!(system.contains("**Último Contacto Registrado:**"));
        assert!(!system.contains("sin contacto previo"));
        assert_eq!(requests[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn invalid_timezone_is_rejected_at_construction() {
        let config = AssistantConfig {
            timezone: "Nowhere/Town".to_string(),
            ..AssistantConfig::default()
        };
        assert!(Harness::try_with_config(config).is_err());
    }
}
