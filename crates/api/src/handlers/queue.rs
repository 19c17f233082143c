//! Handlers for the `/queue` recheck queue.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use warden_core::entity::EntityKind;
use warden_core::error::CoreError;
use warden_core::queue::{QueueInfo, QueuePriority};
use warden_core::types::EntityId;
use warden_db::models::queue::EnqueueRequest;
use warden_db::repositories::QueueRepo;

use crate::error::AppResult;
use crate::extract::Reviewer;
use crate::query::{parse_kind, QueueLengthParams};
use crate::response::DataResponse;
use crate::state::AppState;

const MAX_REASON_LEN: usize = 512;

#[derive(Debug, Serialize)]
pub struct QueueLength {
    pub priority: Option<QueuePriority>,
    pub length: i64,
}

/// POST /api/v1/queue
///
/// Enqueue or promote a recheck. Returns 201 with the entry's position.
pub async fn enqueue(
    reviewer: Reviewer,
    State(state): State<AppState>,
    Json(input): Json<EnqueueRequest>,
) -> AppResult<impl IntoResponse> {
    if input.entity_id <= 0 {
        return Err(CoreError::Validation("entity_id must be positive".into()).into());
    }
    if input.reason.len() > MAX_REASON_LEN {
        return Err(CoreError::Validation(format!(
            "reason must be at most {MAX_REASON_LEN} bytes"
        ))
        .into());
    }

    QueueRepo::enqueue(
        &state.pool,
        input.kind,
        input.entity_id,
        input.priority,
        Some(reviewer.id),
        &input.reason,
    )
    .await?;
    let info = queue_info_or_404(&state, input.kind, input.entity_id).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: info })))
}

/// GET /api/v1/queue/{kind}/{id}
pub async fn info(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, EntityId)>,
) -> AppResult<Json<DataResponse<QueueInfo>>> {
    let kind = parse_kind(&kind)?;
    let info = queue_info_or_404(&state, kind, id).await?;
    Ok(Json(DataResponse { data: info }))
}

/// POST /api/v1/queue/{kind}/{id}/skip
///
/// Withdraw an open entry.
pub async fn skip(
    _reviewer: Reviewer,
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, EntityId)>,
) -> AppResult<StatusCode> {
    let kind = parse_kind(&kind)?;
    if !QueueRepo::skip(&state.pool, kind, id).await? {
        return Err(CoreError::NotFound {
            entity: "QueueEntry",
            id,
        }
        .into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/queue/length?priority=
pub async fn length(
    State(state): State<AppState>,
    Query(params): Query<QueueLengthParams>,
) -> AppResult<Json<DataResponse<QueueLength>>> {
    let priority = params.priority()?;
    let length = QueueRepo::length(&state.pool, priority).await?;
    Ok(Json(DataResponse {
        data: QueueLength { priority, length },
    }))
}

async fn queue_info_or_404(
    state: &AppState,
    kind: EntityKind,
    id: EntityId,
) -> AppResult<QueueInfo> {
    QueueRepo::info(&state.pool, kind, id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "QueueEntry",
                id,
            }
            .into()
        })
}
