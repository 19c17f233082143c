//! Training-mode votes and reviewer accuracy.

use serde::Serialize;
use sqlx::FromRow;
use warden_core::types::{EntityId, ReviewerId, Timestamp};

use super::entity::Entity;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Vote {
    pub entity_kind: String,
    pub entity_id: EntityId,
    pub reviewer_id: ReviewerId,
    pub is_upvote: bool,
    pub is_verified: bool,
    pub is_correct: Option<bool>,
    pub voted_at: Timestamp,
    pub verified_at: Option<Timestamp>,
}

#[derive(Debug, Clone)]
pub enum VoteOutcome {
    /// Vote stored and counters updated; carries the refreshed entity.
    Recorded(Entity),
    AlreadyVoted,
    /// The entity is missing or not in a votable status.
    NotVotable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewerAccuracy {
    pub reviewer_id: ReviewerId,
    pub total: i64,
    pub correct: i64,
    pub accuracy: f64,
}

impl ReviewerAccuracy {
    pub fn new(reviewer_id: ReviewerId, total: i64, correct: i64) -> Self {
        let accuracy = if total > 0 {
            correct as f64 / total as f64
        } else {
            0.0
        };
        Self {
            reviewer_id,
            total,
            correct,
            accuracy,
        }
    }
}
