//! Rows of `hourly_stats`.

use serde::Serialize;
use sqlx::FromRow;
use warden_core::lookup::StatusId;
use warden_core::types::Timestamp;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HourlyStat {
    pub hour: Timestamp,
    pub entity_kind: String,
    pub status_id: StatusId,
    pub total: i64,
}
