//! Repository for the `users` and `groups` tables.
//!
//! Every status change is a conditional `UPDATE ... WHERE status_id = from`
//! so a row can never be observed in two states. Review and scan claims use
//! `FOR UPDATE SKIP LOCKED` so concurrent callers fall through to the next
//! eligible row instead of blocking.

use std::collections::HashMap;
use std::time::Duration;

use sqlx::{PgConnection, PgPool};
use warden_core::activity::{ActivityType, NewActivity};
use warden_core::entity::{EntityKind, EntityStatus, ReviewSortBy, StatusPriority};
use warden_core::lookup::StatusId;
use warden_core::profile::FlagRecord;
use warden_core::types::{EntityId, Timestamp};

use crate::models::entity::{
    ClaimOutcome, Entity, StatusCount, TransitionFields, TransitionOutcome, UpsertSummary,
};
use crate::models::lookup;
use crate::repositories::ActivityRepo;

/// Column list shared by both entity tables.
const COLUMNS: &str = "\
    id, status_id, name, display_name, description, account_created_at, \
    reason, confidence, upvotes, downvotes, reputation, \
    follower_count, following_count, thumbnail_url, details, \
    first_seen_at, last_scanned, last_updated, last_viewed, last_purge_check, \
    verified_at, cleared_at, removed_at";

/// Statuses whose rows still carry training votes and rescans.
const ACTIVE_STATUSES: [StatusId; 2] = [
    EntityStatus::Flagged as StatusId,
    EntityStatus::Confirmed as StatusId,
];

/// Provides status transitions and claims for moderated entities.
pub struct EntityRepo;

impl EntityRepo {
    /// Claim the next entity for review.
    ///
    /// Walks `priority` in order; for each status, claims one row last viewed
    /// at least `cooldown` before `now`, stamping `last_viewed` in the same
    /// statement. Rows locked by concurrent claims are skipped.
    pub async fn get_for_review(
        pool: &PgPool,
        kind: EntityKind,
        sort: ReviewSortBy,
        priority: &StatusPriority,
        cooldown: Duration,
        now: Timestamp,
    ) -> Result<Option<Entity>, sqlx::Error> {
        let table = kind.table();
        let order = order_clause(sort);
        let cutoff = cooldown_cutoff(now, cooldown);
        let query = format!(
            "UPDATE {table} SET last_viewed = $1 \
             WHERE id = ( \
                 SELECT id FROM {table} \
                 WHERE status_id = $2 AND last_viewed <= $3 \
                 ORDER BY {order} \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );

        for status in priority.statuses() {
            let claimed = sqlx::query_as::<_, Entity>(&query)
                .bind(now)
                .bind(status.id())
                .bind(cutoff)
                .fetch_optional(pool)
                .await?;
            if let Some(entity) = claimed {
                tracing::debug!(%kind, id = entity.id, %status, "Claimed entity for review");
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }

    /// Plain read, no claim.
    pub async fn find_by_id(
        pool: &PgPool,
        kind: EntityKind,
        id: EntityId,
    ) -> Result<Option<Entity>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {table} WHERE id = $1", table = kind.table());
        sqlx::query_as::<_, Entity>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Claim a specific entity for review under the same cooldown and
    /// skip-locked rules as [`EntityRepo::get_for_review`].
    pub async fn claim_by_id(
        pool: &PgPool,
        kind: EntityKind,
        id: EntityId,
        cooldown: Duration,
        now: Timestamp,
    ) -> Result<ClaimOutcome, sqlx::Error> {
        let table = kind.table();
        let query = format!(
            "UPDATE {table} SET last_viewed = $2 \
             WHERE id = ( \
                 SELECT id FROM {table} \
                 WHERE id = $1 AND last_viewed <= $3 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let claimed = sqlx::query_as::<_, Entity>(&query)
            .bind(id)
            .bind(now)
            .bind(cooldown_cutoff(now, cooldown))
            .fetch_optional(pool)
            .await?;

        match claimed {
            Some(entity) => Ok(ClaimOutcome::Claimed(entity)),
            None if Self::exists(pool, kind, id).await? => Ok(ClaimOutcome::Busy),
            None => Ok(ClaimOutcome::NotFound),
        }
    }

    async fn exists(pool: &PgPool, kind: EntityKind, id: EntityId) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)",
            table = kind.table()
        );
        sqlx::query_scalar::<_, bool>(&query)
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Move an entity from `from` to `to` and append `activity`, atomically.
    pub async fn transition(
        pool: &PgPool,
        kind: EntityKind,
        id: EntityId,
        from: EntityStatus,
        to: EntityStatus,
        fields: &TransitionFields,
        activity: &NewActivity,
    ) -> Result<TransitionOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let outcome = Self::transition_in(&mut *tx, kind, id, from, to, fields, activity).await?;
        if matches!(outcome, TransitionOutcome::Moved(_)) {
            tx.commit().await?;
        }
        Ok(outcome)
    }

    /// Transition inside the caller's transaction. Nothing is committed here.
    pub async fn transition_in(
        conn: &mut PgConnection,
        kind: EntityKind,
        id: EntityId,
        from: EntityStatus,
        to: EntityStatus,
        fields: &TransitionFields,
        activity: &NewActivity,
    ) -> Result<TransitionOutcome, sqlx::Error> {
        let table = kind.table();
        let query = format!(
            "UPDATE {table} SET \
                 status_id = $3, \
                 reason = COALESCE($4, reason), \
                 confidence = COALESCE($5, confidence), \
                 last_updated = NOW(), \
                 verified_at = CASE WHEN $3 = {confirmed} THEN NOW() ELSE verified_at END, \
                 cleared_at = CASE WHEN $3 = {cleared} THEN NOW() \
                                   WHEN $3 = {flagged} THEN NULL \
                                   ELSE cleared_at END, \
                 removed_at = CASE WHEN $3 = {banned} THEN NOW() ELSE removed_at END \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}",
            confirmed = EntityStatus::Confirmed.id(),
            cleared = EntityStatus::Cleared.id(),
            flagged = EntityStatus::Flagged.id(),
            banned = EntityStatus::Banned.id(),
        );
        let moved = sqlx::query_as::<_, Entity>(&query)
            .bind(id)
            .bind(from.id())
            .bind(to.id())
            .bind(fields.reason.as_deref())
            .bind(fields.confidence)
            .fetch_optional(&mut *conn)
            .await?;

        let Some(entity) = moved else {
            let current: Option<StatusId> =
                sqlx::query_scalar(&format!("SELECT status_id FROM {table} WHERE id = $1"))
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?;
            return match current {
                None => Ok(TransitionOutcome::NotFound),
                Some(status_id) => Ok(TransitionOutcome::StatusMismatch(lookup(
                    status_id,
                    "entity_statuses",
                    EntityStatus::from_id,
                )?)),
            };
        };

        ActivityRepo::insert_in(&mut *conn, activity).await?;
        tracing::info!(%kind, id, %from, %to, "Entity transitioned");
        Ok(TransitionOutcome::Moved(entity))
    }

    /// Apply a training vote to a Flagged or Confirmed row.
    pub async fn update_training_vote(
        pool: &PgPool,
        kind: EntityKind,
        id: EntityId,
        is_upvote: bool,
    ) -> Result<Option<Entity>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::update_training_vote_in(&mut conn, kind, id, is_upvote).await
    }

    pub async fn update_training_vote_in(
        conn: &mut PgConnection,
        kind: EntityKind,
        id: EntityId,
        is_upvote: bool,
    ) -> Result<Option<Entity>, sqlx::Error> {
        let (up, down): (i32, i32) = if is_upvote { (1, 0) } else { (0, 1) };
        let query = format!(
            "UPDATE {table} SET \
                 upvotes = upvotes + $2, \
                 downvotes = downvotes + $3, \
                 reputation = (upvotes + $2) - (downvotes + $3) \
             WHERE id = $1 AND status_id = ANY($4) \
             RETURNING {COLUMNS}",
            table = kind.table()
        );
        sqlx::query_as::<_, Entity>(&query)
            .bind(id)
            .bind(up)
            .bind(down)
            .bind(&ACTIVE_STATUSES[..])
            .fetch_optional(&mut *conn)
            .await
    }

    /// Insert new entities as Flagged and refresh the snapshot of rows that
    /// are still Flagged. Rows in any other status are left untouched.
    ///
    /// Records are written in ascending ID order inside one transaction; each
    /// newly inserted row gets an `auto_flagged` activity entry.
    pub async fn bulk_upsert_flagged(
        pool: &PgPool,
        kind: EntityKind,
        records: &[FlagRecord],
    ) -> Result<UpsertSummary, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let summary = Self::bulk_upsert_flagged_in(&mut *tx, kind, records).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Upsert inside the caller's transaction. Nothing is committed here.
    pub async fn bulk_upsert_flagged_in(
        conn: &mut PgConnection,
        kind: EntityKind,
        records: &[FlagRecord],
    ) -> Result<UpsertSummary, sqlx::Error> {
        let mut summary = UpsertSummary::default();
        if records.is_empty() {
            return Ok(summary);
        }

        let mut ordered: Vec<&FlagRecord> = records.iter().filter(|r| r.kind == kind).collect();
        ordered.sort_by_key(|r| r.id);
        ordered.dedup_by_key(|r| r.id);

        let table = kind.table();
        let query = format!(
            "INSERT INTO {table} \
                 (id, status_id, name, display_name, description, account_created_at, \
                  reason, confidence, follower_count, following_count, thumbnail_url, details, \
                  last_scanned, last_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW()) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 display_name = EXCLUDED.display_name, \
                 description = EXCLUDED.description, \
                 account_created_at = COALESCE(EXCLUDED.account_created_at, {table}.account_created_at), \
                 reason = EXCLUDED.reason, \
                 confidence = EXCLUDED.confidence, \
                 follower_count = EXCLUDED.follower_count, \
                 following_count = EXCLUDED.following_count, \
                 thumbnail_url = COALESCE(EXCLUDED.thumbnail_url, {table}.thumbnail_url), \
                 details = EXCLUDED.details, \
                 last_scanned = NOW(), \
                 last_updated = NOW() \
             WHERE {table}.status_id = $2 \
             RETURNING id, (xmax = 0) AS inserted"
        );

        for record in ordered {
            let row: Option<(EntityId, bool)> = sqlx::query_as(&query)
                .bind(record.id)
                .bind(EntityStatus::Flagged.id())
                .bind(&record.name)
                .bind(&record.display_name)
                .bind(&record.description)
                .bind(record.created_at)
                .bind(&record.reason)
                .bind(record.confidence)
                .bind(record.follower_count)
                .bind(record.following_count)
                .bind(record.thumbnail_url.as_deref())
                .bind(&record.details)
                .fetch_optional(&mut *conn)
                .await?;

            match row {
                Some((id, true)) => {
                    let activity = NewActivity::by_system(kind, id, ActivityType::AutoFlagged)
                        .with_details(serde_json::json!({
                            "reason": record.reason,
                            "confidence": record.confidence,
                        }));
                    ActivityRepo::insert_in(&mut *conn, &activity).await?;
                    summary.inserted.push(id);
                }
                Some((id, false)) => summary.refreshed.push(id),
                None => summary.skipped.push(record.id),
            }
        }

        tracing::info!(
            %kind,
            inserted = summary.inserted.len(),
            refreshed = summary.refreshed.len(),
            skipped = summary.skipped.len(),
            "Upserted flagged entities",
        );
        Ok(summary)
    }

    /// Current status of every stored ID among `ids`. Missing IDs are unflagged.
    pub async fn statuses(
        pool: &PgPool,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, EntityStatus>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = format!(
            "SELECT id, status_id FROM {table} WHERE id = ANY($1)",
            table = kind.table()
        );
        let rows: Vec<(EntityId, StatusId)> =
            sqlx::query_as(&query).bind(ids).fetch_all(pool).await?;
        rows.into_iter()
            .map(|(id, status_id)| {
                Ok::<_, sqlx::Error>((
                    id,
                    lookup(status_id, "entity_statuses", EntityStatus::from_id)?,
                ))
            })
            .collect()
    }

    /// The subset of `ids` currently Confirmed, ascending.
    pub async fn confirmed_among(
        pool: &PgPool,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<Vec<EntityId>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT id FROM {table} WHERE id = ANY($1) AND status_id = $2 ORDER BY id",
            table = kind.table()
        );
        sqlx::query_scalar(&query)
            .bind(ids)
            .bind(EntityStatus::Confirmed.id())
            .fetch_all(pool)
            .await
    }

    /// Claim the next seed for a worker batch: Confirmed rows first, then
    /// Flagged, each not scanned within `rescan_after`. Stamps `last_scanned`.
    pub async fn claim_next_to_scan(
        pool: &PgPool,
        kind: EntityKind,
        rescan_after: Duration,
        now: Timestamp,
    ) -> Result<Option<Entity>, sqlx::Error> {
        let table = kind.table();
        let query = format!(
            "UPDATE {table} SET last_scanned = $1 \
             WHERE id = ( \
                 SELECT id FROM {table} \
                 WHERE status_id = $2 AND last_scanned < $3 \
                 ORDER BY last_scanned ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let cutoff = cooldown_cutoff(now, rescan_after);
        for status in [EntityStatus::Confirmed, EntityStatus::Flagged] {
            let seed = sqlx::query_as::<_, Entity>(&query)
                .bind(now)
                .bind(status.id())
                .bind(cutoff)
                .fetch_optional(pool)
                .await?;
            if seed.is_some() {
                return Ok(seed);
            }
        }
        Ok(None)
    }

    /// Claim up to `limit` Flagged/Confirmed rows not checked for removal
    /// within `interval`, stamping `last_purge_check`.
    pub async fn claim_for_purge_check(
        pool: &PgPool,
        kind: EntityKind,
        limit: i64,
        interval: Duration,
        now: Timestamp,
    ) -> Result<Vec<Entity>, sqlx::Error> {
        let table = kind.table();
        let query = format!(
            "UPDATE {table} SET last_purge_check = $1 \
             WHERE id IN ( \
                 SELECT id FROM {table} \
                 WHERE status_id = ANY($2) AND last_purge_check < $3 \
                 ORDER BY last_purge_check ASC \
                 LIMIT $4 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Entity>(&query)
            .bind(now)
            .bind(&ACTIVE_STATUSES[..])
            .bind(cooldown_cutoff(now, interval))
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Move Flagged/Confirmed rows the platform removed to Banned (users) or
    /// Locked (groups). Returns the IDs actually moved.
    pub async fn mark_removed(
        pool: &PgPool,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<Vec<EntityId>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "UPDATE {table} SET status_id = $2, removed_at = NOW(), last_updated = NOW() \
             WHERE id = ANY($1) AND status_id = ANY($3) \
             RETURNING id",
            table = kind.table()
        );

        let mut tx = pool.begin().await?;
        let moved: Vec<EntityId> = sqlx::query_scalar(&query)
            .bind(ids)
            .bind(EntityStatus::Banned.id())
            .bind(&ACTIVE_STATUSES[..])
            .fetch_all(&mut *tx)
            .await?;
        let activities: Vec<NewActivity> = moved
            .iter()
            .map(|&id| NewActivity::by_system(kind, id, ActivityType::Removed))
            .collect();
        ActivityRepo::insert_many_in(&mut *tx, &activities).await?;
        tx.commit().await?;

        if !moved.is_empty() {
            tracing::info!(%kind, count = moved.len(), "Marked removed entities");
        }
        Ok(moved)
    }

    /// Delete Cleared rows cleared before `cutoff`. They become unflagged.
    pub async fn purge_cleared_before(
        pool: &PgPool,
        kind: EntityKind,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "DELETE FROM {table} WHERE status_id = $1 AND cleared_at < $2",
            table = kind.table()
        );
        let result = sqlx::query(&query)
            .bind(EntityStatus::Cleared.id())
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Row counts per status. Statuses with no rows are reported as zero.
    pub async fn count_by_status(
        pool: &PgPool,
        kind: EntityKind,
    ) -> Result<Vec<StatusCount>, sqlx::Error> {
        let query = format!(
            "SELECT status_id, COUNT(*) FROM {table} GROUP BY status_id",
            table = kind.table()
        );
        let rows: Vec<(StatusId, i64)> = sqlx::query_as(&query).fetch_all(pool).await?;
        let counts: HashMap<StatusId, i64> = rows.into_iter().collect();
        Ok(EntityStatus::ALL
            .iter()
            .map(|&status| StatusCount {
                kind,
                status,
                total: counts.get(&status.id()).copied().unwrap_or(0),
            })
            .collect())
    }
}

fn order_clause(sort: ReviewSortBy) -> &'static str {
    match sort {
        ReviewSortBy::Confidence => "confidence DESC, id ASC",
        ReviewSortBy::LastUpdated => "last_updated ASC, id ASC",
        ReviewSortBy::Reputation => "reputation ASC, id ASC",
        ReviewSortBy::Random => "random()",
    }
}

/// Windows are capped so the subtraction can never overflow.
const MAX_WINDOW_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn cooldown_cutoff(now: Timestamp, window: Duration) -> Timestamp {
    now - chrono::Duration::seconds(window.as_secs().min(MAX_WINDOW_SECS) as i64)
}
