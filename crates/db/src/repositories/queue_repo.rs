//! Repository for `review_queue`, the explicit recheck queue.
//!
//! Entries are served High before Normal before Low and FIFO within a class
//! (by `seq`). Claims use `FOR UPDATE SKIP LOCKED` like the entity store.

use sqlx::PgPool;
use uuid::Uuid;
use warden_core::entity::EntityKind;
use warden_core::lookup::StatusId;
use warden_core::queue::{QueueInfo, QueuePriority, QueueStatus};
use warden_core::types::{EntityId, ReviewerId, Timestamp};

use crate::models::queue::QueueEntry;
use crate::models::{lookup, parse_kind};

const COLUMNS: &str = "\
    id, entity_kind, entity_id, priority_id, status_id, seq, requested_by, reason, \
    claimed_by, enqueued_at, claimed_at, finished_at, updated_at";

const FINISHED: [StatusId; 2] = [QueueStatus::Complete as StatusId, QueueStatus::Skipped as StatusId];

const OPEN: [StatusId; 2] = [QueueStatus::Pending as StatusId, QueueStatus::Processing as StatusId];

/// Priority queue of operator-requested rechecks.
pub struct QueueRepo;

impl QueueRepo {
    /// Insert an entry or promote an existing one.
    ///
    /// Priority never drops for an open entry. A finished entry is reset to
    /// Pending with the requested priority and a fresh sequence number.
    pub async fn enqueue(
        pool: &PgPool,
        kind: EntityKind,
        entity_id: EntityId,
        priority: QueuePriority,
        requested_by: Option<ReviewerId>,
        reason: &str,
    ) -> Result<QueueEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO review_queue \
                 (entity_kind, entity_id, priority_id, status_id, requested_by, reason) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (entity_kind, entity_id) DO UPDATE SET \
                 priority_id = CASE WHEN review_queue.status_id = ANY($7) \
                                    THEN EXCLUDED.priority_id \
                                    ELSE LEAST(review_queue.priority_id, EXCLUDED.priority_id) END, \
                 seq = CASE WHEN review_queue.status_id = ANY($7) \
                            THEN nextval('review_queue_seq') ELSE review_queue.seq END, \
                 enqueued_at = CASE WHEN review_queue.status_id = ANY($7) \
                                    THEN NOW() ELSE review_queue.enqueued_at END, \
                 claimed_by = CASE WHEN review_queue.status_id = ANY($7) \
                                   THEN NULL ELSE review_queue.claimed_by END, \
                 claimed_at = CASE WHEN review_queue.status_id = ANY($7) \
                                   THEN NULL ELSE review_queue.claimed_at END, \
                 finished_at = NULL, \
                 status_id = CASE WHEN review_queue.status_id = ANY($7) \
                                  THEN EXCLUDED.status_id ELSE review_queue.status_id END, \
                 requested_by = COALESCE(EXCLUDED.requested_by, review_queue.requested_by), \
                 reason = EXCLUDED.reason, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        let entry = sqlx::query_as::<_, QueueEntry>(&query)
            .bind(kind.as_str())
            .bind(entity_id)
            .bind(priority.id())
            .bind(QueueStatus::Pending.id())
            .bind(requested_by)
            .bind(reason)
            .bind(&FINISHED[..])
            .fetch_one(pool)
            .await?;
        tracing::info!(%kind, entity_id, %priority, "Enqueued recheck");
        Ok(entry)
    }

    /// Status, priority and position of an entry.
    ///
    /// Position counts pending entries that will be served first: every
    /// higher-priority entry plus same-priority entries enqueued earlier.
    pub async fn info(
        pool: &PgPool,
        kind: EntityKind,
        entity_id: EntityId,
    ) -> Result<Option<QueueInfo>, sqlx::Error> {
        let row: Option<(String, EntityId, StatusId, StatusId, Option<i64>)> = sqlx::query_as(
            "SELECT q.entity_kind, q.entity_id, q.status_id, q.priority_id, \
                 CASE WHEN q.status_id = $3 THEN ( \
                     SELECT COUNT(*) FROM review_queue o \
                     WHERE o.status_id = $3 \
                       AND (o.priority_id < q.priority_id \
                            OR (o.priority_id = q.priority_id AND o.seq < q.seq)) \
                 ) END AS position \
             FROM review_queue q \
             WHERE q.entity_kind = $1 AND q.entity_id = $2",
        )
        .bind(kind.as_str())
        .bind(entity_id)
        .bind(QueueStatus::Pending.id())
        .fetch_optional(pool)
        .await?;

        row.map(|(raw_kind, entity_id, status_id, priority_id, position)| {
            Ok::<_, sqlx::Error>(QueueInfo {
                kind: parse_kind(&raw_kind)?,
                entity_id,
                status: lookup(status_id, "queue_statuses", QueueStatus::from_id)?,
                priority: lookup(priority_id, "queue_priorities", QueuePriority::from_id)?,
                position,
            })
        })
        .transpose()
    }

    /// Claim the oldest pending entry of one priority class.
    pub async fn dequeue(
        pool: &PgPool,
        priority: QueuePriority,
        worker_id: Uuid,
    ) -> Result<Option<QueueEntry>, sqlx::Error> {
        Self::claim(pool, Some(priority), None, worker_id).await
    }

    /// Claim the next pending entry of `kind` across all classes.
    pub async fn dequeue_next(
        pool: &PgPool,
        kind: EntityKind,
        worker_id: Uuid,
    ) -> Result<Option<QueueEntry>, sqlx::Error> {
        Self::claim(pool, None, Some(kind), worker_id).await
    }

    async fn claim(
        pool: &PgPool,
        priority: Option<QueuePriority>,
        kind: Option<EntityKind>,
        worker_id: Uuid,
    ) -> Result<Option<QueueEntry>, sqlx::Error> {
        let query = format!(
            "UPDATE review_queue SET \
                 status_id = $1, claimed_by = $2, claimed_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM review_queue \
                 WHERE status_id = $3 \
                   AND ($4::SMALLINT IS NULL OR priority_id = $4) \
                   AND ($5::TEXT IS NULL OR entity_kind = $5) \
                 ORDER BY priority_id ASC, seq ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueEntry>(&query)
            .bind(QueueStatus::Processing.id())
            .bind(worker_id)
            .bind(QueueStatus::Pending.id())
            .bind(priority.map(QueuePriority::id))
            .bind(kind.map(EntityKind::as_str))
            .fetch_optional(pool)
            .await
    }

    /// Mark an open entry complete. Returns `false` if there was none.
    pub async fn complete(
        pool: &PgPool,
        kind: EntityKind,
        entity_id: EntityId,
    ) -> Result<bool, sqlx::Error> {
        Self::finish(pool, kind, entity_id, QueueStatus::Complete).await
    }

    /// Mark an open entry skipped. Returns `false` if there was none.
    pub async fn skip(
        pool: &PgPool,
        kind: EntityKind,
        entity_id: EntityId,
    ) -> Result<bool, sqlx::Error> {
        Self::finish(pool, kind, entity_id, QueueStatus::Skipped).await
    }

    async fn finish(
        pool: &PgPool,
        kind: EntityKind,
        entity_id: EntityId,
        status: QueueStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE review_queue SET status_id = $3, finished_at = NOW(), updated_at = NOW() \
             WHERE entity_kind = $1 AND entity_id = $2 AND status_id = ANY($4)",
        )
        .bind(kind.as_str())
        .bind(entity_id)
        .bind(status.id())
        .bind(&OPEN[..])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pending entries, optionally restricted to one class.
    pub async fn length(
        pool: &PgPool,
        priority: Option<QueuePriority>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM review_queue \
             WHERE status_id = $1 AND ($2::SMALLINT IS NULL OR priority_id = $2)",
        )
        .bind(QueueStatus::Pending.id())
        .bind(priority.map(QueuePriority::id))
        .fetch_one(pool)
        .await
    }

    /// Return entries stuck in Processing since before `older_than` to
    /// Pending, keeping their place in line.
    pub async fn requeue_stale_processing(
        pool: &PgPool,
        older_than: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE review_queue SET status_id = $1, claimed_by = NULL, claimed_at = NULL, \
                 updated_at = NOW() \
             WHERE status_id = $2 AND claimed_at < $3",
        )
        .bind(QueueStatus::Pending.id())
        .bind(QueueStatus::Processing.id())
        .bind(older_than)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete entries that finished before `before`.
    pub async fn purge_finished(pool: &PgPool, before: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM review_queue WHERE status_id = ANY($1) AND finished_at < $2",
        )
        .bind(&FINISHED[..])
        .bind(before)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
