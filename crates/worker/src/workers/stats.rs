//! Hourly status snapshots and activity log partition upkeep.

use std::time::Duration;

use chrono::{Datelike, Days, DurationRound, Utc};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use warden_core::settings::SettingsHandle;
use warden_core::types::Timestamp;
use warden_db::repositories::{ActivityRepo, StatsRepo};

use super::{before, days};

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(3600);

pub struct StatsWorker {
    pool: PgPool,
    settings: SettingsHandle,
}

impl StatsWorker {
    pub fn new(pool: PgPool, settings: SettingsHandle) -> Self {
        Self { pool, settings }
    }

    /// Snapshots immediately, then once an hour.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!("Stats worker started");
        let mut interval = tokio::time::interval(SNAPSHOT_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stats worker stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once(Utc::now()).await {
                        tracing::error!(error = %e, "Stats pass failed");
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn run_once(&self, now: Timestamp) -> Result<(), sqlx::Error> {
        let hour = start_of_hour(now);
        let written = StatsRepo::snapshot_hour(&self.pool, hour).await?;

        let retention_days = self.settings.current().stats_retention_days;
        let cutoff = before(now, days(retention_days));
        let purged = StatsRepo::purge_before(&self.pool, cutoff).await?;

        tracing::info!(%hour, written, purged, "Stats snapshot stored");

        // Each month is attempted on its own; the first error is reported.
        let mut first_error = None;
        for month in [now, next_month(now)] {
            if let Err(e) = ActivityRepo::ensure_month_partition(&self.pool, month).await {
                tracing::error!(%month, error = %e, "Failed to prepare activity log partition");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

pub fn start_of_hour(now: Timestamp) -> Timestamp {
    now.duration_trunc(chrono::Duration::hours(1)).unwrap_or(now)
}

/// Some instant in the calendar month after `now`.
pub fn next_month(now: Timestamp) -> Timestamp {
    let first = now
        .date_naive()
        .with_day(1)
        .unwrap_or_else(|| now.date_naive());
    let next = first
        .checked_add_days(Days::new(32))
        .unwrap_or(first);
    next.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
}
