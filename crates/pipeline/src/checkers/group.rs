use std::sync::Arc;

use warden_core::entity::{EntityKind, EntityStatus};
use warden_core::profile::{FlagRecord, ProfileInfo};
use warden_core::scoring::score_group_membership;
use warden_core::settings::{ModerationSettings, SettingsHandle};

use super::{distinct, CheckOutcome, Verdict};
use crate::fanout;
use crate::recorder::AffiliationRecorder;
use crate::store::ModerationStore;

/// Flags users who belong to enough confirmed groups.
///
/// Every membership seen here is also handed to the affiliation recorder,
/// whatever the verdict.
#[derive(Clone)]
pub struct GroupChecker {
    store: Arc<dyn ModerationStore>,
    recorder: AffiliationRecorder,
    settings: SettingsHandle,
    concurrency: usize,
}

impl GroupChecker {
    pub fn new(
        store: Arc<dyn ModerationStore>,
        recorder: AffiliationRecorder,
        settings: SettingsHandle,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            recorder,
            settings,
            concurrency,
        }
    }

    pub async fn process_batch(&self, profiles: Vec<ProfileInfo>) -> CheckOutcome {
        let settings = self.settings.current();
        let outcome: CheckOutcome = fanout::bounded(profiles, self.concurrency, |profile| {
            self.check(profile, &settings)
        })
        .await
        .into_iter()
        .collect();

        tracing::debug!(
            flagged = outcome.flagged.len(),
            remaining = outcome.remaining.len(),
            failed = outcome.failed.len(),
            "Group check finished",
        );
        outcome
    }

    async fn check(&self, profile: ProfileInfo, settings: &ModerationSettings) -> Verdict {
        let group_ids = distinct(profile.group_ids());
        if group_ids.is_empty() {
            return Verdict::Pass(profile);
        }

        if let Err(e) = self.recorder.record_memberships(profile.id, &group_ids).await {
            tracing::warn!(user_id = profile.id, error = %e, "Failed to record memberships");
            return Verdict::Failed(profile.id);
        }

        let statuses = match self.store.statuses(EntityKind::Group, &group_ids).await {
            Ok(statuses) => statuses,
            Err(e) => {
                tracing::warn!(user_id = profile.id, error = %e, "Group status lookup failed");
                return Verdict::Failed(profile.id);
            }
        };

        let confirmed = group_ids
            .iter()
            .filter(|id| statuses.get(id) == Some(&EntityStatus::Confirmed))
            .count();
        if confirmed < settings.group_confirmed_threshold {
            return Verdict::Pass(profile);
        }

        let confidence = score_group_membership(confirmed, group_ids.len());
        let reason = format!("Group Analysis: Member of {confirmed} flagged groups");
        tracing::info!(user_id = profile.id, confirmed, confidence, "Flagging user by group membership");
        Verdict::Flag(FlagRecord::user(&profile, reason, confidence))
    }
}
