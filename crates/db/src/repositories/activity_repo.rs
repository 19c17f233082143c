//! Repository for the partitioned `activity_logs` table.

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use sqlx::{PgConnection, PgPool};
use warden_core::activity::NewActivity;
use warden_core::entity::EntityKind;
use warden_core::types::{EntityId, Timestamp};

use crate::models::activity::ActivityLog;

const COLUMNS: &str = "\
    id, entity_kind, entity_id, reviewer_id, activity_type_id, details, created_at";

/// Number of bind parameters per inserted row.
const INSERT_PARAMS: usize = 5;

/// Maximum page size for activity listing.
const MAX_LIMIT: i64 = 200;

/// Append-only audit trail.
pub struct ActivityRepo;

impl ActivityRepo {
    pub async fn insert(pool: &PgPool, activity: &NewActivity) -> Result<(), sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::insert_in(&mut conn, activity).await
    }

    /// Append inside the caller's transaction.
    pub async fn insert_in(
        conn: &mut PgConnection,
        activity: &NewActivity,
    ) -> Result<(), sqlx::Error> {
        Self::insert_many_in(conn, std::slice::from_ref(activity)).await
    }

    /// Multi-row append with a single INSERT.
    pub async fn insert_many_in(
        conn: &mut PgConnection,
        activities: &[NewActivity],
    ) -> Result<(), sqlx::Error> {
        if activities.is_empty() {
            return Ok(());
        }

        let mut query = String::from(
            "INSERT INTO activity_logs \
             (entity_kind, entity_id, reviewer_id, activity_type_id, details) VALUES ",
        );
        for i in 0..activities.len() {
            if i > 0 {
                query.push_str(", ");
            }
            let base = i * INSERT_PARAMS;
            query.push_str(&format!(
                "(${}, ${}, ${}, ${}, ${})",
                base + 1,
                base + 2,
                base + 3,
                base + 4,
                base + 5
            ));
        }

        let mut q = sqlx::query(&query);
        for activity in activities {
            q = q
                .bind(activity.kind.as_str())
                .bind(activity.entity_id)
                .bind(activity.reviewer_id)
                .bind(activity.activity_type.id())
                .bind(&activity.details);
        }
        q.execute(&mut *conn).await?;
        Ok(())
    }

    /// Most recent activity for one entity, newest first.
    pub async fn list_for_entity(
        pool: &PgPool,
        kind: EntityKind,
        entity_id: EntityId,
        limit: i64,
    ) -> Result<Vec<ActivityLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM activity_logs \
             WHERE entity_kind = $1 AND entity_id = $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3"
        );
        sqlx::query_as::<_, ActivityLog>(&query)
            .bind(kind.as_str())
            .bind(entity_id)
            .bind(limit.clamp(1, MAX_LIMIT))
            .fetch_all(pool)
            .await
    }

    /// Create the monthly partition containing `at` if it does not exist yet.
    ///
    /// Rows for that month already sitting in `activity_logs_default` are
    /// moved into the new partition before it is attached, so this works for
    /// the current month as well as future ones. The default partition is
    /// locked for the duration, which also serializes concurrent callers.
    pub async fn ensure_month_partition(pool: &PgPool, at: Timestamp) -> Result<String, sqlx::Error> {
        let (start, end) = month_bounds(at)
            .ok_or_else(|| sqlx::Error::Protocol(format!("no month boundary for {at}")))?;
        let name = format!("activity_logs_y{:04}m{:02}", start.year(), start.month());

        let mut tx = pool.begin().await?;
        sqlx::query("LOCK TABLE activity_logs_default IN ACCESS EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(&name)
            .fetch_one(&mut *tx)
            .await?;
        if exists {
            return Ok(name);
        }

        sqlx::query(&format!(
            "CREATE TABLE {name} (LIKE activity_logs INCLUDING DEFAULTS INCLUDING CONSTRAINTS)"
        ))
        .execute(&mut *tx)
        .await?;

        let moved = sqlx::query(&format!(
            "WITH moved AS ( \
                 DELETE FROM activity_logs_default \
                 WHERE created_at >= $1 AND created_at < $2 \
                 RETURNING * \
             ) \
             INSERT INTO {name} SELECT * FROM moved"
        ))
        .bind(start)
        .bind(end)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(&format!(
            "ALTER TABLE activity_logs ATTACH PARTITION {name} \
             FOR VALUES FROM ('{}') TO ('{}')",
            start.to_rfc3339(),
            end.to_rfc3339()
        ))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(partition = %name, moved, "Created activity log partition");
        Ok(name)
    }
}

/// First instant of the month containing `at` and of the following month.
fn month_bounds(at: Timestamp) -> Option<(Timestamp, Timestamp)> {
    let first = NaiveDate::from_ymd_opt(at.year(), at.month(), 1)?;
    let next = if at.month() == 12 {
        NaiveDate::from_ymd_opt(at.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(at.year(), at.month() + 1, 1)?
    };
    let start = Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0)?);
    let end = Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0)?);
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn december_rolls_into_next_year() {
        let at = Utc.with_ymd_and_hms(2026, 12, 15, 8, 0, 0).unwrap();
        let (start, end) = month_bounds(at).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }
}
