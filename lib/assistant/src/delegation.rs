//! The delegation function and its acknowledgement.

use crate::error::AssistantError;
use relaydesk_ai::ToolDefinition;
use relaydesk_operators::Operator;
use serde::Deserialize;
use serde_json::json;

/// Name of the function the model calls to hand off to a human area.
pub const DELEGATION_TOOL_NAME: &str = "derivar_area";

/// Declares the delegation function with `areas` as the allowed values.
#[must_use]
pub fn delegation_tool(areas: &[String]) -> ToolDefinition {
    ToolDefinition::new(
        DELEGATION_TOOL_NAME,
        "Deriva la conversación a un asesor humano del área indicada.",
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "area": {
                "type": "string",
                "enum": areas,
                "description": "Área a la que se deriva al usuario.",
            },
            "ruc": {
                "type": "string",
                "description": "RUC de la empresa del usuario, si lo indicó.",
            },
            "acta_number": {
                "type": "string",
                "description": "Número de acta mencionado por el usuario, si lo hay.",
            },
        },
        "required": ["area"],
    }))
}

/// Parsed arguments of a delegation call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DelegationArgs {
    pub area: String,
    #[serde(default)]
    pub ruc: Option<String>,
    #[serde(default)]
    pub acta_number: Option<String>,
}

impl DelegationArgs {
    /// Creates arguments for a direct area selection.
    #[must_use]
    pub fn area_only(area: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            ruc: None,
            acta_number: None,
        }
    }

    /// Parses the raw JSON arguments emitted by the model.
    ///
    /// Blank optional fields become `None`; the area is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::InvalidToolArguments`] if the payload is not
    /// a JSON object with a non-empty `area` string.
    pub fn parse(arguments_json: &str) -> Result<Self, AssistantError> {
        let raw: Self =
            serde_json::from_str(arguments_json).map_err(|e| AssistantError::InvalidToolArguments {
                reason: e.to_string(),
            })?;

        let area = raw.area.trim().to_string();
        if area.is_empty() {
            return Err(AssistantError::InvalidToolArguments {
                reason: "area must not be empty".to_string(),
            });
        }

        Ok(Self {
            area,
            ruc: non_blank(raw.ruc),
            acta_number: non_blank(raw.acta_number),
        })
    }

    /// Builds the hand-off acknowledgement shown to the user and stored as
    /// the tool result.
    #[must_use]
    pub fn acknowledgement(&self, operator: Option<&Operator>) -> String {
        let mut text = format!("Has seleccionado el área de {}.", self.area);
        if let Some(ruc) = &self.ruc {
            text.push_str(&format!(" Registramos tu RUC {ruc}."));
        }
        if let Some(acta) = &self.acta_number {
            text.push_str(&format!(" Registramos el acta {acta}."));
        }
        match operator {
            Some(op) => text.push_str(&format!(
                " Tu asesor {} se pondrá en contacto contigo pronto.",
                op.display_name
            )),
            None => text.push_str(" Un asesor se pondrá en contacto contigo pronto."),
        }
        text
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaydesk_core::AreaId;

    #[test]
    fn tool_declares_area_enum() {
        let areas = vec!["cobranzas".to_string(), "retail".to_string()];
        let tool = delegation_tool(&areas);
        assert_eq!(tool.name, "derivar_area");
        assert_eq!(tool.parameters["properties"]["area"]["enum"][1], "retail");
        assert_eq!(tool.parameters["required"][0], "area");
    }

    #[test]
    fn parse_full_arguments() {
        let args =
            DelegationArgs::parse(r#"{"area":"cobranzas","ruc":"12345678901","acta_number":" "}"#)
                .unwrap();
        assert_eq!(args.area, "cobranzas");
        assert_eq!(args.ruc.as_deref(), Some("12345678901"));
        assert_eq!(args.acta_number, None);
    }

    #[test]
    fn parse_rejects_malformed_payloads() {
        for raw in ["", "{", r#"{"ruc":"1"}"#, r#"{"area":"  "}"#, "42"] {
            assert!(
                matches!(
                    DelegationArgs::parse(raw),
                    Err(AssistantError::InvalidToolArguments { .. })
                ),
                "{raw}"
            );
        }
    }

    #[test]
    fn acknowledgement_without_operator_is_generic() {
        let ack = DelegationArgs::area_only("retail").acknowledgement(None);
        assert_eq!(
            ack,
            "Has seleccionado el área de retail. Un asesor se pondrá en contacto contigo pronto."
        );
    }

    #[test]
    fn acknowledgement_names_operator_and_ruc() {
        let operator = Operator::new("Ana", AreaId::new(), "51911111111");
        let args = DelegationArgs {
            area: "cobranzas".to_string(),
            ruc: Some("12345678901".to_string()),
            acta_number: None,
        };
        let ack = args.acknowledgement(Some(&operator));
        assert!(ack.contains("12345678901"));
        assert!(ack.contains("Tu asesor Ana"));
    }
}
