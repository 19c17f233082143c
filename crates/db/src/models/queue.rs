//! Rows of `review_queue`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use warden_core::entity::EntityKind;
use warden_core::lookup::StatusId;
use warden_core::queue::{QueuePriority, QueueStatus};
use warden_core::types::{DbId, EntityId, ReviewerId, Timestamp};

use super::{lookup, parse_kind};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueEntry {
    pub id: DbId,
    pub entity_kind: String,
    pub entity_id: EntityId,
    pub priority_id: StatusId,
    pub status_id: StatusId,
    pub seq: i64,
    pub requested_by: Option<ReviewerId>,
    pub reason: String,
    pub claimed_by: Option<Uuid>,
    pub enqueued_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl QueueEntry {
    pub fn kind(&self) -> Result<EntityKind, sqlx::Error> {
        parse_kind(&self.entity_kind)
    }

    pub fn priority(&self) -> Result<QueuePriority, sqlx::Error> {
        lookup(self.priority_id, "queue_priorities", QueuePriority::from_id)
    }

    pub fn status(&self) -> Result<QueueStatus, sqlx::Error> {
        lookup(self.status_id, "queue_statuses", QueueStatus::from_id)
    }
}

/// DTO for `POST /api/v1/queue`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueRequest {
    pub kind: EntityKind,
    pub entity_id: EntityId,
    #[serde(default)]
    pub priority: QueuePriority,
    #[serde(default)]
    pub reason: String,
}
