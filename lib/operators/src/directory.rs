//! Operator Directory and assignment.

use crate::error::DirectoryError;
use crate::operator::{Area, Operator};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use relaydesk_core::{AreaId, OperatorId};
use std::sync::RwLock;

/// Registry of areas and operators.
#[async_trait]
pub trait OperatorDirectory: Send + Sync {
    /// Looks up an area by name.
    async fn find_area(&self, name: &str) -> Result<Option<Area>, DirectoryError>;

    /// Lists available operators of `area_id`, or of every area when `None`.
    async fn find_available(&self, area_id: Option<AreaId>)
    -> Result<Vec<Operator>, DirectoryError>;
}

/// Picks one candidate uniformly at random.
///
/// `None` means no operator is currently assignable; it is a legitimate
/// outcome, not a failure.
#[must_use]
pub fn select_operator(candidates: &[Operator]) -> Option<&Operator> {
    candidates.choose(&mut rand::thread_rng())
}

/// Process-local directory for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryOperatorDirectory {
    areas: RwLock<Vec<Area>>,
    operators: RwLock<Vec<Operator>>,
}

impl InMemoryOperatorDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an area.
    pub fn add_area(&self, area: Area) {
        if let Ok(mut areas) = self.areas.write() {
            areas.push(area);
        }
    }

    /// Registers an operator.
    pub fn add_operator(&self, operator: Operator) {
        if let Ok(mut operators) = self.operators.write() {
            operators.push(operator);
        }
    }

    /// Updates an operator's availability. Returns false if unknown.
    pub fn set_available(&self, operator_id: OperatorId, available: bool) -> bool {
        let Ok(mut operators) = self.operators.write() else {
            return false;
        };
        match operators.iter_mut().find(|o| o.id == operator_id) {
            Some(operator) => {
                operator.available = available;
                true
            }
            None => false,
        }
    }

    fn poisoned() -> DirectoryError {
        DirectoryError::LookupFailed {
            reason: "directory lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl OperatorDirectory for InMemoryOperatorDirectory {
    async fn find_area(&self, name: &str) -> Result<Option<Area>, DirectoryError> {
        let areas = self.areas.read().map_err(|_| Self::poisoned())?;
        Ok(areas.iter().find(|a| a.matches(name)).cloned())
    }

    async fn find_available(
        &self,
        area_id: Option<AreaId>,
    ) -> Result<Vec<Operator>, DirectoryError> {
        let operators = self.operators.read().map_err(|_| Self::poisoned())?;
        Ok(operators
            .iter()
            .filter(|o| o.available)
            .filter(|o| area_id.is_none_or(|id| o.area_id == id))
            .cloned()
            .collect())
    }
}
