//! Human operators for relaydesk.
//!
//! This crate provides:
//!
//! - **Areas and operators**: organizational units and the people in them
//! - **Operator Directory**: availability lookups by area
//! - **Assignment**: uniform random selection among available operators
//! - **Notifier**: fire-and-forget push of assignment events, with a NATS
//!   implementation

pub mod directory;
pub mod error;
pub mod nats;
pub mod notifier;
pub mod operator;

pub use directory::{InMemoryOperatorDirectory, OperatorDirectory, select_operator};
pub use error::{DirectoryError, NotifyError};
pub use nats::{NatsNotifier, NatsNotifierConfig};
pub use notifier::{AssignmentNotification, NEW_ASSIGNMENT_EVENT, Notifier};
pub use operator::{Area, Operator};
