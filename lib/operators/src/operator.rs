//! Areas and operators.

use relaydesk_core::{AreaId, OperatorId};
use serde::{Deserialize, Serialize};

/// A named organizational unit that owns a pool of operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
}

impl Area {
    /// Creates an area with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: AreaId::new(),
            name: name.into(),
        }
    }

    /// Returns true if `name` refers to this area, ignoring case and
    /// surrounding whitespace.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

/// A human operator.
///
/// Availability is managed outside the assistant; being assigned a
/// conversation does not clear `available`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub display_name: String,
    pub area_id: AreaId,
    pub phone: String,
    pub available: bool,
}

impl Operator {
    /// Creates an available operator with a fresh id.
    #[must_use]
    pub fn new(display_name: impl Into<String>, area_id: AreaId, phone: impl Into<String>) -> Self {
        Self {
            id: OperatorId::new(),
            display_name: display_name.into(),
            area_id,
            phone: phone.into(),
            available: true,
        }
    }

    /// Returns the real-time channel target for this operator.
    #[must_use]
    pub fn notification_target(&self) -> String {
        self.id.to_string()
    }
}
