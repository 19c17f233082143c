//! Reviewer identity extractor.
//!
//! Authentication happens upstream of this service; the fronting proxy
//! forwards the authenticated reviewer's numeric ID in `x-reviewer-id`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use warden_core::types::ReviewerId;

use crate::error::AppError;
use crate::state::AppState;

pub const REVIEWER_HEADER: &str = "x-reviewer-id";

/// The reviewer making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reviewer {
    pub id: ReviewerId,
}

impl FromRequestParts<AppState> for Reviewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(REVIEWER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {REVIEWER_HEADER} header")))?;

        let id = raw
            .trim()
            .parse::<ReviewerId>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                AppError::Unauthorized(format!("{REVIEWER_HEADER} must be a positive integer"))
            })?;

        Ok(Reviewer { id })
    }
}
