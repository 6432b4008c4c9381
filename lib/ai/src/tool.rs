//! Function declarations offered to the model.

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

/// Definition of a function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description, shown to the model.
    pub description: String,
    /// JSON schema for the arguments object.
    pub parameters: JsonValue,
}

impl ToolDefinition {
    /// Creates a tool that takes no arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    /// Sets the arguments schema.
    #[must_use]
    pub fn with_parameters(mut self, schema: JsonValue) -> Self {
        self.parameters = schema;
        self
    }

    /// Renders the declaration in chat-completions `tools[]` form.
    #[must_use]
    pub fn to_function_json(&self) -> JsonValue {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_json_shape() {
        let tool = ToolDefinition::new("derivar_area", "Deriva al area").with_parameters(json!({
            "type": "object",
            "properties": { "area": { "type": "string" } },
            "required": ["area"],
        }));

        let rendered = tool.to_function_json();
        assert_eq!(rendered["type"], "function");
        assert_eq!(rendered["function"]["name"], "derivar_area");
        assert_eq!(rendered["function"]["parameters"]["required"][0], "area");
    }

    #[test]
    fn default_schema_is_empty_object() {
        let tool = ToolDefinition::new("ping", "noop");
        assert_eq!(tool.parameters["type"], "object");
    }
}
