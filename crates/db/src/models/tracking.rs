//! Rows of `group_member_trackings`.

use serde::Serialize;
use sqlx::FromRow;
use warden_core::types::{EntityId, Timestamp};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GroupTracking {
    pub group_id: EntityId,
    pub user_ids: Vec<EntityId>,
    pub last_appended: Timestamp,
    pub is_flagged: bool,
}
