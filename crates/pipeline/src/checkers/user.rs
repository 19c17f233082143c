use std::sync::Arc;

use warden_core::capabilities::{Classifier, ThumbnailFetcher};
use warden_core::entity::EntityKind;
use warden_core::profile::{FlagRecord, ProfileInfo};
use warden_core::settings::SettingsHandle;
use warden_core::types::EntityId;

use super::{AiChecker, CheckOutcome, FriendChecker, GroupChecker};
use crate::error::PipelineError;
use crate::fanout::DEFAULT_CONCURRENCY;
use crate::recorder::AffiliationRecorder;
use crate::store::ModerationStore;

/// What a full user check did with one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub checked: usize,
    pub inserted: Vec<EntityId>,
    pub refreshed: Vec<EntityId>,
    /// Flagged this run but left alone because a reviewer already decided.
    pub skipped: Vec<EntityId>,
    pub failed: Vec<EntityId>,
}

impl CheckReport {
    pub fn flagged(&self) -> usize {
        self.inserted.len() + self.refreshed.len()
    }
}

/// Runs group, friend and (optionally) AI checks in sequence and persists
/// whatever they flag.
#[derive(Clone)]
pub struct UserChecker {
    store: Arc<dyn ModerationStore>,
    thumbnails: Arc<dyn ThumbnailFetcher>,
    group: GroupChecker,
    friend: FriendChecker,
    ai: Option<AiChecker>,
}

impl UserChecker {
    pub fn new(
        store: Arc<dyn ModerationStore>,
        recorder: AffiliationRecorder,
        thumbnails: Arc<dyn ThumbnailFetcher>,
        settings: SettingsHandle,
    ) -> Self {
        Self::with_concurrency(store, recorder, thumbnails, settings, DEFAULT_CONCURRENCY)
    }

    pub fn with_concurrency(
        store: Arc<dyn ModerationStore>,
        recorder: AffiliationRecorder,
        thumbnails: Arc<dyn ThumbnailFetcher>,
        settings: SettingsHandle,
        concurrency: usize,
    ) -> Self {
        Self {
            group: GroupChecker::new(store.clone(), recorder.clone(), settings.clone(), concurrency),
            friend: FriendChecker::new(store.clone(), recorder, settings, concurrency),
            ai: None,
            store,
            thumbnails,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>, concurrency: usize) -> Self {
        self.ai = Some(AiChecker::new(classifier, concurrency));
        self
    }

    /// Check a batch and persist flagged users.
    ///
    /// Per-profile failures are returned in the report. A store failure
    /// while saving fails the whole batch.
    pub async fn process_users(&self, profiles: Vec<ProfileInfo>) -> Result<CheckReport, PipelineError> {
        let checked = profiles.len();
        let mut flagged = Vec::new();
        let mut failed = Vec::new();

        let by_group = self.group.process_batch(profiles).await;
        let remaining = absorb(by_group, &mut flagged, &mut failed);

        let by_friend = self.friend.process_batch(remaining).await;
        let remaining = absorb(by_friend, &mut flagged, &mut failed);

        if let Some(ai) = &self.ai {
            let by_ai = ai.process_batch(remaining).await;
            absorb(by_ai, &mut flagged, &mut failed);
        }

        self.fill_thumbnails(&mut flagged).await;
        let summary = if flagged.is_empty() {
            Default::default()
        } else {
            self.store.save_flagged(EntityKind::User, &flagged).await?
        };

        let report = CheckReport {
            checked,
            inserted: summary.inserted,
            refreshed: summary.refreshed,
            skipped: summary.skipped,
            failed,
        };
        tracing::info!(
            checked,
            flagged = report.flagged(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "User batch checked",
        );
        Ok(report)
    }

    /// Best effort; a thumbnail failure never fails the batch.
    async fn fill_thumbnails(&self, records: &mut [FlagRecord]) {
        let missing: Vec<EntityId> = records
            .iter()
            .filter(|r| r.thumbnail_url.is_none())
            .map(|r| r.id)
            .collect();
        if missing.is_empty() {
            return;
        }

        match self.thumbnails.thumbnail_urls(EntityKind::User, &missing).await {
            Ok(mut urls) => {
                for record in records.iter_mut() {
                    if let Some(url) = urls.remove(&record.id) {
                        record.thumbnail_url = Some(url);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(count = missing.len(), error = %e, "Thumbnail lookup failed");
            }
        }
    }
}

fn absorb(
    outcome: CheckOutcome,
    flagged: &mut Vec<FlagRecord>,
    failed: &mut Vec<EntityId>,
) -> Vec<ProfileInfo> {
    flagged.extend(outcome.flagged);
    failed.extend(outcome.failed);
    outcome.remaining
}
