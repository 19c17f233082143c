//! Rows of the `users` / `groups` tables.

use serde::Serialize;
use sqlx::FromRow;
use warden_core::entity::{EntityKind, EntityStatus};
use warden_core::lookup::StatusId;
use warden_core::types::{EntityId, Timestamp};

/// A user or group under moderation. Both tables share this layout.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub status_id: StatusId,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub account_created_at: Option<Timestamp>,
    pub reason: String,
    pub confidence: f64,
    pub upvotes: i32,
    pub downvotes: i32,
    pub reputation: i32,
    pub follower_count: i64,
    pub following_count: i64,
    pub thumbnail_url: Option<String>,
    pub details: serde_json::Value,
    pub first_seen_at: Timestamp,
    pub last_scanned: Timestamp,
    pub last_updated: Timestamp,
    pub last_viewed: Timestamp,
    pub last_purge_check: Timestamp,
    pub verified_at: Option<Timestamp>,
    pub cleared_at: Option<Timestamp>,
    pub removed_at: Option<Timestamp>,
}

impl Entity {
    /// `None` only if the row carries an ID missing from `EntityStatus`.
    pub fn status(&self) -> Option<EntityStatus> {
        EntityStatus::from_id(self.status_id)
    }
}

/// Fields applied alongside a status transition. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct TransitionFields {
    pub reason: Option<String>,
    pub confidence: Option<f64>,
}

/// Result of a conditional status move.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Moved(Entity),
    NotFound,
    /// The row exists but is not in the expected source status.
    StatusMismatch(EntityStatus),
}

/// Result of claiming a specific entity for review.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Claimed(Entity),
    /// Viewed within the cooldown or locked by a concurrent claim.
    Busy,
    NotFound,
}

/// What `bulk_upsert_flagged` did with each record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: Vec<EntityId>,
    pub refreshed: Vec<EntityId>,
    /// Rows left alone because they are no longer Flagged.
    pub skipped: Vec<EntityId>,
}

impl UpsertSummary {
    pub fn touched(&self) -> usize {
        self.inserted.len() + self.refreshed.len()
    }
}

/// Count of rows per status for one kind.
#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub kind: EntityKind,
    pub status: EntityStatus,
    pub total: i64,
}
