//! Friend and member scan workers.
//!
//! Each iteration walks `WaitForBatch → FetchProfiles → RunCheckers →
//! PersistResults → RequeueFailures`. Failed IDs are carried into the next
//! batch until the retry ledger dead-letters them.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use warden_core::retry::RetryLedger;
use warden_core::settings::SettingsHandle;
use warden_core::types::EntityId;
use warden_pipeline::loader::ProfileLoader;
use warden_pipeline::qualifier::GroupQualifier;
use warden_pipeline::recorder::AffiliationRecorder;
use warden_pipeline::{PipelineError, UserChecker};

use super::pause;
use crate::batch::{BatchAssembler, CandidateSource};
use crate::config::LoopTiming;

/// Counters for one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub assembled: usize,
    pub loaded: usize,
    pub flagged_users: usize,
    pub flagged_groups: usize,
    pub retrying: usize,
    pub dead_lettered: usize,
}

pub struct ScanWorker<S> {
    name: String,
    source: S,
    assembler: BatchAssembler,
    loader: ProfileLoader,
    checker: UserChecker,
    recorder: AffiliationRecorder,
    qualifier: GroupQualifier,
    settings: SettingsHandle,
    timing: LoopTiming,
    ledger: RetryLedger,
    carried: Vec<EntityId>,
}

impl<S: CandidateSource + 'static> ScanWorker<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        source: S,
        assembler: BatchAssembler,
        loader: ProfileLoader,
        checker: UserChecker,
        recorder: AffiliationRecorder,
        qualifier: GroupQualifier,
        settings: SettingsHandle,
        timing: LoopTiming,
    ) -> Self {
        let ledger = RetryLedger::new(settings.current().max_retry_attempts);
        Self {
            name: name.into(),
            source,
            assembler,
            loader,
            checker,
            recorder,
            qualifier,
            settings,
            timing,
            ledger,
            carried: Vec::new(),
        }
    }

    /// IDs waiting to be retried in the next batch.
    pub fn carried(&self) -> &[EntityId] {
        &self.carried
    }

    pub fn dead_lettered(&self) -> u64 {
        self.ledger.dead_lettered()
    }

    pub async fn run(mut self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(worker = %self.name, "Scan worker started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = tokio::time::timeout(self.timing.batch_timeout, self.run_batch()) => result,
            };

            let wait = match result {
                Ok(Ok(stats)) if stats.assembled == 0 => {
                    tracing::debug!(worker = %self.name, "No candidates, idling");
                    self.timing.idle_poll
                }
                Ok(Ok(stats)) => {
                    tracing::info!(
                        worker = %self.name,
                        assembled = stats.assembled,
                        loaded = stats.loaded,
                        flagged_users = stats.flagged_users,
                        flagged_groups = stats.flagged_groups,
                        retrying = stats.retrying,
                        dead_lettered = stats.dead_lettered,
                        "Batch finished",
                    );
                    continue;
                }
                Ok(Err(e)) => {
                    tracing::error!(worker = %self.name, error = %e, "Batch failed, backing off");
                    self.timing.failure_backoff
                }
                Err(_) => {
                    tracing::error!(
                        worker = %self.name,
                        timeout_secs = self.timing.batch_timeout.as_secs(),
                        carried = self.carried.len(),
                        "Batch timed out, backing off",
                    );
                    self.requeue_all();
                    self.timing.failure_backoff
                }
            };

            if !pause(wait, &cancel).await {
                break;
            }
        }

        tracing::info!(worker = %self.name, "Scan worker stopped");
        Ok(())
    }

    /// Run one batch.
    ///
    /// The assembled IDs are carried from the moment they are assembled, so a
    /// batch that fails or is cancelled hands them all to the next one. Each
    /// batch-level failure counts as an attempt against the retry ledger.
    pub async fn run_batch(&mut self) -> Result<BatchStats, PipelineError> {
        let ids = self
            .assembler
            .assemble(&mut self.source, &self.carried)
            .await?;
        let mut stats = BatchStats {
            assembled: ids.len(),
            ..Default::default()
        };
        if ids.is_empty() {
            return Ok(stats);
        }
        self.carried.clone_from(&ids);

        let failed = match self.process(&ids, &mut stats).await {
            Ok(failed) => failed,
            Err(e) => {
                self.requeue_all();
                return Err(e);
            }
        };

        let failed_set: HashSet<EntityId> = failed.iter().copied().collect();
        for id in ids.iter().filter(|id| !failed_set.contains(id)) {
            self.ledger.record_success(*id);
        }

        let (retry, dead) = self.ledger.triage(&failed);
        if !dead.is_empty() {
            tracing::warn!(worker = %self.name, ids = ?dead, "Dead-lettered after repeated failures");
        }
        stats.retrying = retry.len();
        stats.dead_lettered = dead.len();
        self.carried = retry;
        Ok(stats)
    }

    /// FetchProfiles through PersistResults. Returns the IDs that failed
    /// individually.
    async fn process(
        &self,
        ids: &[EntityId],
        stats: &mut BatchStats,
    ) -> Result<Vec<EntityId>, PipelineError> {
        let loaded = self.loader.load_many(ids).await;
        stats.loaded = loaded.profiles.len();

        let report = self.checker.process_users(loaded.profiles).await?;
        stats.flagged_users = report.flagged();

        self.recorder.flush().await?;
        let min_users = self.settings.current().affiliation_min_users;
        let groups = self.qualifier.flag_qualified(min_users).await?;
        stats.flagged_groups = groups.inserted.len();

        Ok(loaded.failed.into_iter().chain(report.failed).collect())
    }

    /// Count a failed attempt for every carried ID and drop the exhausted
    /// ones.
    fn requeue_all(&mut self) {
        let carried = std::mem::take(&mut self.carried);
        let (retry, dead) = self.ledger.triage(&carried);
        if !dead.is_empty() {
            tracing::warn!(worker = %self.name, ids = ?dead, "Dead-lettered after repeated failures");
        }
        self.carried = retry;
    }
}
