//! Handler for `/stats`.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use warden_core::entity::EntityKind;
use warden_core::types::Timestamp;
use warden_db::models::entity::StatusCount;
use warden_db::models::stats::HourlyStat;
use warden_db::repositories::{EntityRepo, StatsRepo};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Hours of snapshots returned alongside the live counts.
const HISTORY_HOURS: i64 = 24;

#[derive(Debug, Serialize)]
pub struct StatsOverview {
    pub counts: Vec<StatusCount>,
    pub latest_snapshot: Option<Timestamp>,
    pub hourly: Vec<HourlyStat>,
}

/// GET /api/v1/stats
pub async fn overview(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<StatsOverview>>> {
    let mut counts = EntityRepo::count_by_status(&state.pool, EntityKind::User).await?;
    counts.extend(EntityRepo::count_by_status(&state.pool, EntityKind::Group).await?);

    let since = Utc::now() - chrono::Duration::hours(HISTORY_HOURS);
    let hourly = StatsRepo::list_since(&state.pool, since).await?;
    let latest_snapshot = StatsRepo::latest_hour(&state.pool).await?;

    Ok(Json(DataResponse {
        data: StatsOverview {
            counts,
            latest_snapshot,
            hourly,
        },
    }))
}
