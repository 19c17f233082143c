pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /stats                              live counts and hourly snapshots
/// /settings                           get, update (PUT)
/// /reviewers/{id}/accuracy            training vote accuracy
///
/// /queue                              enqueue or promote (POST)
/// /queue/length                       pending entries, ?priority=
/// /queue/{kind}/{id}                  status, priority, position
/// /queue/{kind}/{id}/skip             withdraw an open entry (POST)
///
/// /{kind}/review/next                 claim next, ?sort=&target=
/// /{kind}/{id}                        lookup (no claim)
/// /{kind}/{id}/claim                  claim one entity (POST)
/// /{kind}/{id}/confirm                flagged -> confirmed (POST)
/// /{kind}/{id}/clear                  flagged|confirmed -> cleared (POST)
/// /{kind}/{id}/skip                   pass on an entity (POST)
/// /{kind}/{id}/vote                   training vote (POST)
/// ```
///
/// `{kind}` is `user`, `users`, `group` or `groups`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::stats::overview))
        .route(
            "/settings",
            get(handlers::settings::current).put(handlers::settings::update),
        )
        .route(
            "/reviewers/{id}/accuracy",
            get(handlers::review::reviewer_accuracy),
        )
        .merge(queue_routes())
        .merge(review_routes())
}

fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/queue", post(handlers::queue::enqueue))
        .route("/queue/length", get(handlers::queue::length))
        .route("/queue/{kind}/{id}", get(handlers::queue::info))
        .route("/queue/{kind}/{id}/skip", post(handlers::queue::skip))
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/{kind}/review/next", get(handlers::review::next_for_review))
        .route("/{kind}/{id}", get(handlers::review::lookup))
        .route("/{kind}/{id}/claim", post(handlers::review::claim))
        .route("/{kind}/{id}/confirm", post(handlers::review::confirm))
        .route("/{kind}/{id}/clear", post(handlers::review::clear))
        .route("/{kind}/{id}/skip", post(handlers::review::skip))
        .route("/{kind}/{id}/vote", post(handlers::review::vote))
}
