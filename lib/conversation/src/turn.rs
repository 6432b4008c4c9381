//! Turn types for conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The role of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// End-user utterance.
    User,
    /// Assistant reply, possibly carrying tool invocations.
    Assistant,
    /// Result of a tool invocation.
    Tool,
}

impl TurnRole {
    /// Returns the storage representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    /// Parses the storage representation of a role.
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function call requested by the language model within an assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Model-generated identifier, unique within the assistant turn.
    pub id: String,
    /// The function the model asked for.
    pub function_name: String,
    /// Raw JSON arguments, validated only when consumed.
    pub arguments_json: String,
}

impl ToolInvocation {
    /// Creates a new tool invocation.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        function_name: impl Into<String>,
        arguments_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            arguments_json: arguments_json.into(),
        }
    }
}

/// One entry in a conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    /// End-user utterance.
    User {
        content: String,
        timestamp: DateTime<Utc>,
    },
    /// Assistant reply. `content` may be empty when tool invocations are present.
    Assistant {
        content: String,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_invocations: Vec<ToolInvocation>,
    },
    /// Result of the tool invocation identified by `tool_call_id`.
    Tool {
        content: String,
        tool_call_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl Turn {
    /// Creates a user turn stamped now.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a plain assistant turn stamped now.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            timestamp: Utc::now(),
            tool_invocations: Vec::new(),
        }
    }

    /// Creates an assistant turn carrying tool invocations.
    #[must_use]
    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_invocations: Vec<ToolInvocation>,
    ) -> Self {
        Self::Assistant {
            content: content.into(),
            timestamp: Utc::now(),
            tool_invocations,
        }
    }

    /// Creates a tool result turn stamped now.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Returns the role of this turn.
    #[must_use]
    pub fn role(&self) -> TurnRole {
        match self {
            Self::User { .. } => TurnRole::User,
            Self::Assistant { .. } => TurnRole::Assistant,
            Self::Tool { .. } => TurnRole::Tool,
        }
    }

    /// Returns the textual content.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::User { content, .. }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    /// Returns when the turn was created.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::User { timestamp, .. }
            | Self::Assistant { timestamp, .. }
            | Self::Tool { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the tool invocations of an assistant turn (empty otherwise).
    #[must_use]
    pub fn tool_invocations(&self) -> &[ToolInvocation] {
        match self {
            Self::Assistant {
                tool_invocations, ..
            } => tool_invocations,
            _ => &[],
        }
    }

    /// Returns the correlated invocation id of a tool turn.
    #[must_use]
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::Tool { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    /// Returns true if this is an assistant turn with tool invocations.
    #[must_use]
    pub fn has_tool_invocations(&self) -> bool {
        !self.tool_invocations().is_empty()
    }

    /// Returns true if `other` has the same role and the same trimmed content.
    ///
    /// Used to suppress double-appends caused by retried deliveries.
    #[must_use]
    pub fn repeats(&self, other: &Turn) -> bool {
        self.role() == other.role() && self.content().trim() == other.content().trim()
    }

    /// Checks the per-variant content rules.
    ///
    /// # Errors
    ///
    /// Returns a description of the violated rule.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::User { content, .. } if content.trim().is_empty() => {
                Err("user turn content must not be empty".to_string())
            }
            Self::Tool { tool_call_id, .. } if tool_call_id.is_empty() => {
                Err("tool turn must reference a tool call id".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_roles() {
        assert_eq!(Turn::user("hola").role(), TurnRole::User);
        assert_eq!(Turn::assistant("hola").role(), TurnRole::Assistant);
        assert_eq!(Turn::tool("call_1", "ok").role(), TurnRole::Tool);
    }

    #[test]
    fn assistant_with_tools_exposes_invocations() {
        let turn = Turn::assistant_with_tools(
            "",
            vec![ToolInvocation::new("call_1", "derivar_area", "{}")],
        );
        assert!(turn.has_tool_invocations());
        assert_eq!(turn.tool_invocations()[0].id, "call_1");
        assert_eq!(turn.tool_call_id(), None);
    }

    #[test]
    fn repeats_compares_role_and_trimmed_content() {
        let a = Turn::user("quiero pagar ");
        assert!(a.repeats(&Turn::user("  quiero pagar")));
        assert!(!a.repeats(&Turn::assistant("quiero pagar")));
        assert!(!a.repeats(&Turn::user("quiero pagar hoy")));
    }

    #[test]
    fn empty_user_turn_is_invalid() {
        assert!(Turn::user("   ").validate().is_err());
        assert!(Turn::assistant("").validate().is_ok());
        assert!(Turn::tool("", "x").validate().is_err());
    }

    #[test]
    fn role_storage_values() {
        for role in [TurnRole::User, TurnRole::Assistant, TurnRole::Tool] {
            assert_eq!(TurnRole::from_str_value(role.as_str()), Some(role));
        }
        assert_eq!(TurnRole::from_str_value("system"), None);
    }

    #[test]
    fn turn_serializes_with_role_tag() {
        let json = serde_json::to_value(Turn::tool("call_9", "derivado")).expect("serialize");
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_9");

        let plain = serde_json::to_value(Turn::assistant("hola")).expect("serialize");
        assert!(plain.get("tool_invocations").is_none());
    }
}
