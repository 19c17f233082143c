//! `AppError` to HTTP response mapping.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use warden_api::error::AppError;
use warden_core::entity::{EntityKind, EntityStatus};
use warden_core::error::CoreError;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn not_found_names_the_entity() {
    let (status, json) =
        error_to_response(CoreError::NotFound { entity: "User", id: 42 }.into()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "User with id 42 not found");
}

#[tokio::test]
async fn contention_and_bad_transitions_are_conflicts() {
    let (status, json) =
        error_to_response(CoreError::AlreadyLocked { entity: "Group", id: 3 }.into()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ALREADY_LOCKED");

    let (status, json) = error_to_response(
        CoreError::InvariantViolation {
            kind: EntityKind::User,
            id: 5,
            expected: EntityStatus::Flagged,
            actual: EntityStatus::Cleared,
        }
        .into(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_TRANSITION");
    assert_eq!(
        json["error"],
        "Invalid transition for user 5: expected flagged, found cleared"
    );
}

#[tokio::test]
async fn unknown_policy_names_are_bad_requests() {
    let (status, json) =
        error_to_response(CoreError::Configuration("Unknown ReviewSortBy 'x'".into()).into())
            .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "CONFIGURATION_ERROR");
}

#[tokio::test]
async fn internal_details_are_never_returned() {
    for err in [
        AppError::Core(CoreError::Internal("pool exhausted at 10.0.0.3".into())),
        AppError::InternalError("serializer exploded".into()),
        AppError::Database(sqlx::Error::PoolTimedOut),
    ] {
        let (status, json) = error_to_response(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["error"], "An internal error occurred, please retry");
    }

    let (status, json) =
        error_to_response(CoreError::TransientFetch("gateway 502".into()).into()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "An internal error occurred, please retry");
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let (status, json) = error_to_response(AppError::Unauthorized("no header".into())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}
