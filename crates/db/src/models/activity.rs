//! Rows of the partitioned `activity_logs` table.

use serde::Serialize;
use sqlx::FromRow;
use warden_core::lookup::StatusId;
use warden_core::types::{DbId, EntityId, ReviewerId, Timestamp};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivityLog {
    pub id: DbId,
    pub entity_kind: String,
    pub entity_id: EntityId,
    pub reviewer_id: Option<ReviewerId>,
    pub activity_type_id: StatusId,
    pub details: serde_json::Value,
    pub created_at: Timestamp,
}
