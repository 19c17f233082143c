//! Repository for training-mode `votes` and their verification.
//!
//! An upvote means the reviewer judged the entity inappropriate. When a
//! reviewer later confirms or clears the entity, every unverified vote is
//! scored exactly once against that decision and copied into `vote_stats`.

use sqlx::{PgConnection, PgPool};
use warden_core::entity::EntityKind;
use warden_core::types::{EntityId, ReviewerId};

use crate::models::vote::{ReviewerAccuracy, Vote, VoteOutcome};
use crate::repositories::EntityRepo;

const COLUMNS: &str = "\
    entity_kind, entity_id, reviewer_id, is_upvote, is_verified, is_correct, \
    voted_at, verified_at";

pub struct VoteRepo;

impl VoteRepo {
    /// Record one vote per reviewer per entity and bump the entity's
    /// counters, in one transaction.
    pub async fn record_vote(
        pool: &PgPool,
        kind: EntityKind,
        entity_id: EntityId,
        reviewer_id: ReviewerId,
        is_upvote: bool,
    ) -> Result<VoteOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(entity) =
            EntityRepo::update_training_vote_in(&mut *tx, kind, entity_id, is_upvote).await?
        else {
            return Ok(VoteOutcome::NotVotable);
        };

        let inserted = sqlx::query(
            "INSERT INTO votes (entity_kind, entity_id, reviewer_id, is_upvote) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (entity_kind, entity_id, reviewer_id) DO NOTHING",
        )
        .bind(kind.as_str())
        .bind(entity_id)
        .bind(reviewer_id)
        .bind(is_upvote)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            // Dropping the transaction undoes the counter bump.
            return Ok(VoteOutcome::AlreadyVoted);
        }

        tx.commit().await?;
        Ok(VoteOutcome::Recorded(entity))
    }

    /// Score every unverified vote on an entity against the final decision.
    /// Returns the number of votes verified.
    pub async fn verify_in(
        conn: &mut PgConnection,
        kind: EntityKind,
        entity_id: EntityId,
        was_inappropriate: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "WITH verified AS ( \
                 UPDATE votes SET is_verified = TRUE, is_correct = (is_upvote = $3), \
                     verified_at = NOW() \
                 WHERE entity_kind = $1 AND entity_id = $2 AND NOT is_verified \
                 RETURNING reviewer_id, is_correct \
             ) \
             INSERT INTO vote_stats (reviewer_id, entity_kind, entity_id, is_correct) \
             SELECT reviewer_id, $1, $2, is_correct FROM verified",
        )
        .bind(kind.as_str())
        .bind(entity_id)
        .bind(was_inappropriate)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_for_entity(
        pool: &PgPool,
        kind: EntityKind,
        entity_id: EntityId,
    ) -> Result<Vec<Vote>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM votes \
             WHERE entity_kind = $1 AND entity_id = $2 \
             ORDER BY voted_at"
        );
        sqlx::query_as::<_, Vote>(&query)
            .bind(kind.as_str())
            .bind(entity_id)
            .fetch_all(pool)
            .await
    }

    /// Share of a reviewer's verified votes that matched the final decision.
    pub async fn reviewer_accuracy(
        pool: &PgPool,
        reviewer_id: ReviewerId,
    ) -> Result<ReviewerAccuracy, sqlx::Error> {
        let (total, correct): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_correct) \
             FROM vote_stats WHERE reviewer_id = $1",
        )
        .bind(reviewer_id)
        .fetch_one(pool)
        .await?;
        Ok(ReviewerAccuracy::new(reviewer_id, total, correct))
    }
}
