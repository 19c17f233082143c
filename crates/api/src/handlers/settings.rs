//! Handlers for `/settings`.
//!
//! Writes are stored and picked up by the refresher of every process on its
//! next poll; they are not applied to this process immediately.

use axum::extract::State;
use axum::Json;
use warden_core::settings::ModerationSettings;
use warden_db::repositories::SettingsRepo;

use crate::error::{AppError, AppResult};
use crate::extract::Reviewer;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/settings
pub async fn current(State(state): State<AppState>) -> Json<DataResponse<ModerationSettings>> {
    Json(DataResponse {
        data: (*state.settings.current()).clone(),
    })
}

/// PUT /api/v1/settings
///
/// The body may name any subset of keys. The merged result is validated
/// before it is stored.
pub async fn update(
    reviewer: Reviewer,
    State(state): State<AppState>,
    Json(overrides): Json<serde_json::Value>,
) -> AppResult<Json<DataResponse<ModerationSettings>>> {
    let merged = state.settings.current().overlay(overrides)?;
    let document = serde_json::to_value(&merged)
        .map_err(|e| AppError::InternalError(format!("Failed to encode settings: {e}")))?;
    SettingsRepo::save(&state.pool, &document).await?;

    tracing::info!(reviewer = reviewer.id, "Moderation settings saved");
    Ok(Json(DataResponse { data: merged }))
}
