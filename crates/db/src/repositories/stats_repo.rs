//! Repository for `hourly_stats` snapshots.

use sqlx::PgPool;
use warden_core::entity::EntityKind;
use warden_core::types::Timestamp;

use crate::models::stats::HourlyStat;

const COLUMNS: &str = "hour, entity_kind, status_id, total";

pub struct StatsRepo;

impl StatsRepo {
    /// Store per-status counts of both kinds for `hour`. Re-running the same
    /// hour overwrites it. Returns the number of rows written.
    pub async fn snapshot_hour(pool: &PgPool, hour: Timestamp) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut written = 0;
        for kind in [EntityKind::User, EntityKind::Group] {
            let query = format!(
                "INSERT INTO hourly_stats (hour, entity_kind, status_id, total) \
                 SELECT $1, $2, status_id, COUNT(*) FROM {table} GROUP BY status_id \
                 ON CONFLICT (hour, entity_kind, status_id) DO UPDATE SET total = EXCLUDED.total",
                table = kind.table()
            );
            written += sqlx::query(&query)
                .bind(hour)
                .bind(kind.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(written)
    }

    pub async fn latest_hour(pool: &PgPool) -> Result<Option<Timestamp>, sqlx::Error> {
        sqlx::query_scalar("SELECT MAX(hour) FROM hourly_stats")
            .fetch_one(pool)
            .await
    }

    pub async fn list_since(
        pool: &PgPool,
        since: Timestamp,
    ) -> Result<Vec<HourlyStat>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM hourly_stats WHERE hour >= $1 \
             ORDER BY hour, entity_kind, status_id"
        );
        sqlx::query_as::<_, HourlyStat>(&query)
            .bind(since)
            .fetch_all(pool)
            .await
    }

    pub async fn purge_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM hourly_stats WHERE hour < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
