//! Drains the recheck queue through the same checkers as the scan workers.
//!
//! Entries that fail stay in `Processing` and are put back to `Pending` by
//! the stale-claim sweep at the start of each pass.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use warden_core::capabilities::ProfileFetcher;
use warden_core::entity::EntityKind;
use warden_core::types::EntityId;
use warden_db::repositories::{EntityRepo, QueueRepo};
use warden_pipeline::loader::ProfileLoader;
use warden_pipeline::recorder::AffiliationRecorder;
use warden_pipeline::{PipelineError, UserChecker};

use super::{before, pause};
use crate::config::LoopTiming;

pub struct QueueWorker {
    pool: PgPool,
    worker_id: Uuid,
    loader: ProfileLoader,
    checker: UserChecker,
    recorder: AffiliationRecorder,
    fetcher: Arc<dyn ProfileFetcher>,
    batch_size: usize,
    stale_after: Duration,
    timing: LoopTiming,
}

impl QueueWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        loader: ProfileLoader,
        checker: UserChecker,
        recorder: AffiliationRecorder,
        fetcher: Arc<dyn ProfileFetcher>,
        batch_size: usize,
        stale_after: Duration,
        timing: LoopTiming,
    ) -> Self {
        Self {
            pool,
            worker_id: Uuid::new_v4(),
            loader,
            checker,
            recorder,
            fetcher,
            batch_size: batch_size.max(1),
            stale_after,
            timing,
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(worker_id = %self.worker_id, "Queue worker started");

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = tokio::time::timeout(self.timing.batch_timeout, self.run_once()) => result,
            };

            let wait = match result {
                Ok(Ok(0)) => self.timing.idle_poll,
                Ok(Ok(processed)) => {
                    tracing::info!(processed, "Queue pass finished");
                    continue;
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Queue pass failed, backing off");
                    self.timing.failure_backoff
                }
                Err(_) => {
                    tracing::error!("Queue pass timed out, backing off");
                    self.timing.failure_backoff
                }
            };
            if !pause(wait, &cancel).await {
                break;
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Queue worker stopped");
        Ok(())
    }

    /// One pass over both kinds. Returns the number of entries finished.
    pub async fn run_once(&self) -> Result<usize, PipelineError> {
        let stale_cutoff = before(Utc::now(), self.stale_after);
        let requeued = QueueRepo::requeue_stale_processing(&self.pool, stale_cutoff).await?;
        if requeued > 0 {
            tracing::warn!(requeued, "Returned stale queue claims to pending");
        }

        let users = self.process_users().await?;
        let groups = self.process_groups().await?;
        Ok(users + groups)
    }

    async fn claim(&self, kind: EntityKind) -> Result<Vec<EntityId>, PipelineError> {
        let mut ids = Vec::new();
        while ids.len() < self.batch_size {
            match QueueRepo::dequeue_next(&self.pool, kind, self.worker_id).await? {
                Some(entry) => ids.push(entry.entity_id),
                None => break,
            }
        }
        Ok(ids)
    }

    async fn process_users(&self) -> Result<usize, PipelineError> {
        let ids = self.claim(EntityKind::User).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let loaded = self.loader.load_many(&ids).await;
        let report = self.checker.process_users(loaded.profiles).await?;
        self.recorder.flush().await?;

        if !loaded.skipped.is_empty() {
            EntityRepo::mark_removed(&self.pool, EntityKind::User, &loaded.skipped).await?;
        }

        let failed: HashSet<EntityId> = loaded.failed.into_iter().chain(report.failed).collect();
        let mut finished = 0;
        for id in ids {
            if failed.contains(&id) {
                tracing::warn!(user_id = id, "Queued recheck failed, leaving for retry");
                continue;
            }
            if QueueRepo::complete(&self.pool, EntityKind::User, id).await? {
                finished += 1;
            }
        }
        Ok(finished)
    }

    async fn process_groups(&self) -> Result<usize, PipelineError> {
        let ids = self.claim(EntityKind::Group).await?;
        let mut finished = 0;
        for group_id in ids {
            match self.fetcher.fetch_group_info(group_id).await {
                Ok(info) => {
                    if info.is_locked {
                        EntityRepo::mark_removed(&self.pool, EntityKind::Group, &[group_id]).await?;
                    }
                    if QueueRepo::complete(&self.pool, EntityKind::Group, group_id).await? {
                        finished += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(group_id, error = %e, "Queued group recheck failed, leaving for retry");
                }
            }
        }
        Ok(finished)
    }
}
