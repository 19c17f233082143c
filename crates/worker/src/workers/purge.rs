//! Periodic removal sweeps.
//!
//! - Flagged/Confirmed entities the platform has banned or locked move to
//!   Banned/Locked.
//! - Cleared entities past retention are deleted.
//! - Affiliation records not appended to recently are deleted.
//! - Finished queue entries past retention are deleted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use warden_core::capabilities::ProfileFetcher;
use warden_core::entity::EntityKind;
use warden_core::settings::SettingsHandle;
use warden_db::repositories::{EntityRepo, QueueRepo, TrackingRepo};
use warden_pipeline::PipelineError;

use super::{before, days};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeStats {
    pub checked: usize,
    pub removed: usize,
    pub cleared_purged: u64,
    pub tracking_purged: u64,
    pub queue_purged: u64,
}

pub struct PurgeWorker {
    pool: PgPool,
    fetcher: Arc<dyn ProfileFetcher>,
    settings: SettingsHandle,
    batch_size: i64,
    poll: Duration,
    queue_retention: Duration,
}

impl PurgeWorker {
    pub fn new(
        pool: PgPool,
        fetcher: Arc<dyn ProfileFetcher>,
        settings: SettingsHandle,
        batch_size: i64,
        poll: Duration,
        queue_retention: Duration,
    ) -> Self {
        Self {
            pool,
            fetcher,
            settings,
            batch_size,
            poll,
            queue_retention,
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(poll_secs = self.poll.as_secs(), "Purge worker started");
        let mut interval = tokio::time::interval(self.poll);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Purge worker stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(stats) if stats == PurgeStats::default() => {
                            tracing::debug!("Purge: nothing to do");
                        }
                        Ok(stats) => {
                            tracing::info!(
                                checked = stats.checked,
                                removed = stats.removed,
                                cleared_purged = stats.cleared_purged,
                                tracking_purged = stats.tracking_purged,
                                queue_purged = stats.queue_purged,
                                "Purge pass finished",
                            );
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Purge pass failed");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn run_once(&self) -> Result<PurgeStats, PipelineError> {
        let settings = self.settings.current();
        let now = Utc::now();
        let mut stats = PurgeStats::default();

        for kind in [EntityKind::User, EntityKind::Group] {
            let claimed = EntityRepo::claim_for_purge_check(
                &self.pool,
                kind,
                self.batch_size,
                settings.purge_check_interval(),
                now,
            )
            .await?;
            stats.checked += claimed.len();

            let ids: Vec<_> = claimed.iter().map(|e| e.id).collect();
            if !ids.is_empty() {
                match self.fetcher.fetch_removed(kind, &ids).await {
                    Ok(removed) => {
                        stats.removed += EntityRepo::mark_removed(&self.pool, kind, &removed)
                            .await?
                            .len();
                    }
                    Err(e) => {
                        tracing::warn!(%kind, count = ids.len(), error = %e, "Removal check failed");
                    }
                }
            }

            let cleared_cutoff = before(now, days(settings.cleared_retention_days));
            stats.cleared_purged +=
                EntityRepo::purge_cleared_before(&self.pool, kind, cleared_cutoff).await?;
        }

        let tracking_cutoff = before(now, days(settings.tracking_stale_days));
        stats.tracking_purged = TrackingRepo::purge_stale(&self.pool, tracking_cutoff).await?;
        let queue_cutoff = before(now, self.queue_retention);
        stats.queue_purged = QueueRepo::purge_finished(&self.pool, queue_cutoff).await?;
        Ok(stats)
    }
}
