//! Conversion from stored turns to backend messages.

use relaydesk_ai::{LlmMessage, LlmToolCall};
use relaydesk_conversation::{ToolInvocation, Turn};

/// Converts a tool invocation to its backend form.
#[must_use]
pub fn tool_call(invocation: &ToolInvocation) -> LlmToolCall {
    LlmToolCall::new(
        invocation.id.clone(),
        invocation.function_name.clone(),
        invocation.arguments_json.clone(),
    )
}

/// Converts a backend function call to its stored form.
#[must_use]
pub fn tool_invocation(call: &LlmToolCall) -> ToolInvocation {
    ToolInvocation::new(call.id.clone(), call.name.clone(), call.arguments.clone())
}

/// Converts one turn.
#[must_use]
pub fn to_message(turn: &Turn) -> LlmMessage {
    match turn {
        Turn::User { content, .. } => LlmMessage::user(content.clone()),
        Turn::Assistant {
            content,
            tool_invocations,
            ..
        } if !tool_invocations.is_empty() => LlmMessage::assistant_with_calls(
            content.clone(),
            tool_invocations.iter().map(tool_call).collect(),
        ),
        Turn::Assistant { content, .. } => LlmMessage::assistant(content.clone()),
        Turn::Tool {
            content,
            tool_call_id,
            ..
        } => LlmMessage::tool(tool_call_id.clone(), content.clone()),
    }
}

/// Converts a prompt-ready sequence.
#[must_use]
pub fn to_messages(sequence: &[Turn]) -> Vec<LlmMessage> {
    sequence.iter().map(to_message).collect()
}

/// Joins the fixed instruction with the time context.
#[must_use]
pub fn system_preamble(instruction: &str, time_context: &str) -> String {
    format!("{}\n\n{}", instruction.trim_end(), time_context)
}
