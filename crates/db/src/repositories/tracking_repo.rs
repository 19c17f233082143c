//! Repository for `group_member_trackings`, the affiliation aggregator.
//!
//! Writers lock existing rows in ascending `group_id` order before touching
//! them, so batches with overlapping groups serialize instead of deadlocking.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use sqlx::{PgConnection, PgPool};
use warden_core::entity::EntityStatus;
use warden_core::types::{EntityId, Timestamp};

use crate::models::tracking::GroupTracking;

const COLUMNS: &str = "group_id, user_ids, last_appended, is_flagged";

/// Tracks which users have been seen in which groups.
pub struct TrackingRepo;

impl TrackingRepo {
    /// Record that `user_id` was observed in `group_id`.
    pub async fn record_signal(
        pool: &PgPool,
        group_id: EntityId,
        user_id: EntityId,
        now: Timestamp,
    ) -> Result<(), sqlx::Error> {
        let mut signals = BTreeMap::new();
        signals.insert(group_id, BTreeSet::from([user_id]));
        Self::record_signals(pool, &signals, now).await
    }

    /// Merge a batch of signals in one transaction.
    ///
    /// Each group's set becomes the sorted, deduplicated union of the stored
    /// and new user IDs; `last_appended` is refreshed. Groups a reviewer has
    /// already decided on (any status past Flagged) are not tracked.
    pub async fn record_signals(
        pool: &PgPool,
        signals: &BTreeMap<EntityId, BTreeSet<EntityId>>,
        now: Timestamp,
    ) -> Result<(), sqlx::Error> {
        if signals.is_empty() {
            return Ok(());
        }
        let candidates: Vec<EntityId> = signals.keys().copied().collect();

        let mut tx = pool.begin().await?;

        let settled: HashSet<EntityId> = sqlx::query_scalar::<_, EntityId>(
            "SELECT id FROM groups WHERE id = ANY($1) AND status_id <> $2",
        )
        .bind(&candidates)
        .bind(EntityStatus::Flagged.id())
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();
        if !settled.is_empty() {
            tracing::debug!(groups = settled.len(), "Skipping signals for decided groups");
        }
        let group_ids: Vec<EntityId> = candidates
            .into_iter()
            .filter(|id| !settled.contains(id))
            .collect();
        if group_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "SELECT group_id FROM group_member_trackings \
             WHERE group_id = ANY($1) \
             ORDER BY group_id \
             FOR UPDATE",
        )
        .bind(&group_ids)
        .fetch_all(&mut *tx)
        .await?;

        // BTreeMap iteration is ascending, matching the lock order above.
        for (group_id, users) in signals {
            if users.is_empty() || settled.contains(group_id) {
                continue;
            }
            let user_ids: Vec<EntityId> = users.iter().copied().collect();
            sqlx::query(
                "INSERT INTO group_member_trackings (group_id, user_ids, last_appended) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (group_id) DO UPDATE SET \
                     user_ids = ARRAY( \
                         SELECT DISTINCT u \
                         FROM unnest(group_member_trackings.user_ids || EXCLUDED.user_ids) AS u \
                         ORDER BY u \
                     ), \
                     last_appended = EXCLUDED.last_appended",
            )
            .bind(group_id)
            .bind(&user_ids)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(groups = group_ids.len(), "Recorded affiliation signals");
        Ok(())
    }

    /// Unlatched groups with at least `min_users` tracked users, without
    /// latching them.
    pub async fn qualified(
        pool: &PgPool,
        min_users: i32,
    ) -> Result<BTreeMap<EntityId, Vec<EntityId>>, sqlx::Error> {
        let rows: Vec<(EntityId, Vec<EntityId>)> = sqlx::query_as(
            "SELECT group_id, user_ids FROM group_member_trackings \
             WHERE NOT is_flagged AND cardinality(user_ids) >= $1 \
             ORDER BY group_id",
        )
        .bind(min_users)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Latch and return every unlatched group with at least `min_users`
    /// tracked users.
    ///
    /// A single statement flips `is_flagged`, so a group is returned at most
    /// once no matter how many callers drain concurrently.
    pub async fn drain_qualified(
        pool: &PgPool,
        min_users: i32,
    ) -> Result<BTreeMap<EntityId, Vec<EntityId>>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::drain_qualified_in(&mut conn, min_users, None).await
    }

    /// Drain inside the caller's transaction, optionally limited to
    /// `only`. The latch is released if the transaction rolls back.
    pub async fn drain_qualified_in(
        conn: &mut PgConnection,
        min_users: i32,
        only: Option<&[EntityId]>,
    ) -> Result<BTreeMap<EntityId, Vec<EntityId>>, sqlx::Error> {
        let rows: Vec<(EntityId, Vec<EntityId>)> = sqlx::query_as(
            "UPDATE group_member_trackings SET is_flagged = TRUE \
             WHERE group_id IN ( \
                 SELECT group_id FROM group_member_trackings \
                 WHERE NOT is_flagged AND cardinality(user_ids) >= $1 \
                   AND ($2::BIGINT[] IS NULL OR group_id = ANY($2)) \
                 ORDER BY group_id \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING group_id, user_ids",
        )
        .bind(min_users)
        .bind(only)
        .fetch_all(&mut *conn)
        .await?;

        if !rows.is_empty() {
            tracing::info!(groups = rows.len(), min_users, "Drained qualified groups");
        }
        Ok(rows.into_iter().collect())
    }

    /// Delete records not appended to since `cutoff`.
    pub async fn purge_stale(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM group_member_trackings WHERE last_appended < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn find(
        pool: &PgPool,
        group_id: EntityId,
    ) -> Result<Option<GroupTracking>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM group_member_trackings WHERE group_id = $1");
        sqlx::query_as::<_, GroupTracking>(&query)
            .bind(group_id)
            .fetch_optional(pool)
            .await
    }

    /// Tracked users of one group, empty when the group was never seen.
    pub async fn tracked_users(
        pool: &PgPool,
        group_id: EntityId,
    ) -> Result<Vec<EntityId>, sqlx::Error> {
        Ok(Self::find(pool, group_id)
            .await?
            .map(|t| t.user_ids)
            .unwrap_or_default())
    }
}
