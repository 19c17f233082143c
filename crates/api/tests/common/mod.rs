#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use warden_api::config::ServerConfig;
use warden_api::extract::REVIEWER_HEADER;
use warden_api::router::build_app_router;
use warden_api::state::AppState;
use warden_core::entity::{EntityKind, EntityStatus};
use warden_core::profile::FlagRecord;
use warden_core::settings::{ModerationSettings, SettingsHandle};
use warden_core::types::{EntityId, ReviewerId};
use warden_db::repositories::EntityRepo;

pub const REVIEWER: ReviewerId = 7;

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: String::new(),
        db_max_connections: 5,
        settings_refresh_secs: 60,
    }
}

/// The production router over `pool` with default moderation settings.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, ModerationSettings::default())
}

pub fn build_test_app_with(pool: PgPool, settings: ModerationSettings) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        settings: SettingsHandle::fixed(settings),
    };
    build_app_router(state, &config).unwrap()
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    reviewer: Option<ReviewerId>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = reviewer {
        builder = builder.header(REVIEWER_HEADER, id.to_string());
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

/// GET as [`REVIEWER`].
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(REVIEWER), None).await
}

/// POST as [`REVIEWER`].
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(REVIEWER), Some(body)).await
}

pub async fn post_as(
    app: Router,
    reviewer: ReviewerId,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(reviewer), Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(REVIEWER), Some(body)).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn record(kind: EntityKind, id: EntityId, confidence: f64) -> FlagRecord {
    FlagRecord {
        kind,
        id,
        name: format!("{kind}-{id}"),
        display_name: format!("{kind} {id}"),
        description: String::new(),
        created_at: None,
        reason: "seeded".into(),
        confidence,
        follower_count: 0,
        following_count: 0,
        thumbnail_url: None,
        details: serde_json::json!({}),
    }
}

/// Insert Flagged rows.
pub async fn seed_flagged(pool: &PgPool, kind: EntityKind, rows: &[(EntityId, f64)]) {
    let records: Vec<FlagRecord> = rows.iter().map(|&(id, c)| record(kind, id, c)).collect();
    EntityRepo::bulk_upsert_flagged(pool, kind, &records)
        .await
        .unwrap();
}

pub async fn status_of(pool: &PgPool, kind: EntityKind, id: EntityId) -> Option<EntityStatus> {
    EntityRepo::find_by_id(pool, kind, id)
        .await
        .unwrap()
        .and_then(|e| e.status())
}
