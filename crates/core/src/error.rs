use crate::entity::{EntityKind, EntityStatus};
use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: EntityId },

    #[error("{entity} {id} is claimed by another reviewer")]
    AlreadyLocked { entity: &'static str, id: EntityId },

    #[error("Transient fetch failure: {0}")]
    TransientFetch(String),

    #[error("Invalid transition for {kind} {id}: expected {expected}, found {actual}")]
    InvariantViolation {
        kind: EntityKind,
        id: EntityId,
        expected: EntityStatus,
        actual: EntityStatus,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the caller may retry the operation (possibly on another row).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::NotFound { .. } | CoreError::AlreadyLocked { .. } | CoreError::TransientFetch(_)
        )
    }
}
