//! Recheck queue priorities and entry lifecycle.

use serde::Serialize;

use crate::entity::EntityKind;
use crate::types::EntityId;

define_lookup_enum! {
    /// Priority class of a queue entry. Lower IDs are served first.
    QueuePriority {
        High = 1 => "high",
        Normal = 2 => "normal",
        Low = 3 => "low",
    }
}

impl Default for QueuePriority {
    fn default() -> Self {
        QueuePriority::Normal
    }
}

impl QueuePriority {
    /// Whether `self` would be served before `other`.
    pub fn outranks(self, other: QueuePriority) -> bool {
        self.id() < other.id()
    }
}

define_lookup_enum! {
    /// Queue entry lifecycle: `Pending -> Processing -> {Complete, Skipped}`.
    QueueStatus {
        Pending = 1 => "pending",
        Processing = 2 => "processing",
        Complete = 3 => "complete",
        Skipped = 4 => "skipped",
    }
}

impl QueueStatus {
    /// Complete and skipped entries only move again when re-enqueued.
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Complete | QueueStatus::Skipped)
    }
}

/// Snapshot returned by a queue position lookup.
///
/// `position` is zero-based among pending entries (0 = next to be served)
/// and is `None` once the entry has left the pending state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueInfo {
    pub kind: EntityKind,
    pub entity_id: EntityId,
    pub status: QueueStatus,
    pub priority: QueuePriority,
    pub position: Option<i64>,
}
