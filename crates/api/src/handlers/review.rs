//! Handlers for `/{kind}/...` review endpoints.
//!
//! Every endpoint requires the [`Reviewer`] header.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use warden_core::types::{EntityId, ReviewerId};
use warden_db::models::vote::ReviewerAccuracy;
use warden_db::repositories::VoteRepo;

use crate::error::AppResult;
use crate::extract::Reviewer;
use crate::query::{parse_kind, ConfirmRequest, NextReviewParams, VoteRequest};
use crate::response::DataResponse;
use crate::service::{LookupView, ReviewItem, ReviewService};
use crate::state::AppState;

fn service(state: &AppState) -> ReviewService<'_> {
    ReviewService::new(&state.pool, state.settings.current())
}

/// GET /api/v1/{kind}/review/next?sort=&target=
///
/// `data` is `null` when nothing is eligible.
pub async fn next_for_review(
    reviewer: Reviewer,
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<NextReviewParams>,
) -> AppResult<Json<DataResponse<Option<ReviewItem>>>> {
    let kind = parse_kind(&kind)?;
    let item = service(&state)
        .next_to_review(kind, params.sort()?, params.target()?, reviewer)
        .await?;
    Ok(Json(DataResponse { data: item }))
}

/// POST /api/v1/{kind}/{id}/claim
pub async fn claim(
    reviewer: Reviewer,
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, EntityId)>,
) -> AppResult<Json<DataResponse<ReviewItem>>> {
    let kind = parse_kind(&kind)?;
    let item = service(&state).claim(kind, id, reviewer).await?;
    Ok(Json(DataResponse { data: item }))
}

/// GET /api/v1/{kind}/{id}
pub async fn lookup(
    reviewer: Reviewer,
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, EntityId)>,
) -> AppResult<Json<DataResponse<LookupView>>> {
    let kind = parse_kind(&kind)?;
    let view = service(&state).lookup(kind, id, reviewer).await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /api/v1/{kind}/{id}/confirm
pub async fn confirm(
    reviewer: Reviewer,
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, EntityId)>,
    Json(input): Json<ConfirmRequest>,
) -> AppResult<Json<DataResponse<ReviewItem>>> {
    let kind = parse_kind(&kind)?;
    let item = service(&state)
        .confirm(kind, id, reviewer, input.reason)
        .await?;
    Ok(Json(DataResponse { data: item }))
}

/// POST /api/v1/{kind}/{id}/clear
pub async fn clear(
    reviewer: Reviewer,
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, EntityId)>,
) -> AppResult<Json<DataResponse<ReviewItem>>> {
    let kind = parse_kind(&kind)?;
    let item = service(&state).clear(kind, id, reviewer).await?;
    Ok(Json(DataResponse { data: item }))
}

/// POST /api/v1/{kind}/{id}/skip
pub async fn skip(
    reviewer: Reviewer,
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, EntityId)>,
) -> AppResult<StatusCode> {
    let kind = parse_kind(&kind)?;
    service(&state).skip(kind, id, reviewer).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/{kind}/{id}/vote
pub async fn vote(
    reviewer: Reviewer,
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, EntityId)>,
    Json(input): Json<VoteRequest>,
) -> AppResult<Json<DataResponse<ReviewItem>>> {
    let kind = parse_kind(&kind)?;
    let item = service(&state)
        .vote(kind, id, reviewer, input.upvote)
        .await?;
    Ok(Json(DataResponse { data: item }))
}

/// GET /api/v1/reviewers/{id}/accuracy
pub async fn reviewer_accuracy(
    _reviewer: Reviewer,
    State(state): State<AppState>,
    Path(reviewer_id): Path<ReviewerId>,
) -> AppResult<Json<DataResponse<ReviewerAccuracy>>> {
    let accuracy = VoteRepo::reviewer_accuracy(&state.pool, reviewer_id).await?;
    Ok(Json(DataResponse { data: accuracy }))
}
