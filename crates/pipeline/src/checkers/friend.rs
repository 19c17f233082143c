use std::sync::Arc;

use chrono::Utc;
use warden_core::entity::{EntityKind, EntityStatus};
use warden_core::profile::{FlagRecord, ProfileInfo};
use warden_core::scoring::{inappropriate_share, score_friend_network, MIN_FRIENDS_FOR_SCORING};
use warden_core::settings::{ModerationSettings, SettingsHandle};

use super::{distinct, CheckOutcome, Verdict};
use crate::fanout;
use crate::recorder::AffiliationRecorder;
use crate::store::ModerationStore;

/// Scores a user's friend network against the flag threshold.
#[derive(Clone)]
pub struct FriendChecker {
    store: Arc<dyn ModerationStore>,
    recorder: AffiliationRecorder,
    settings: SettingsHandle,
    concurrency: usize,
}

impl FriendChecker {
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
            "Friend check finished",
        );
        outcome
    }

    async fn check(&self, profile: ProfileInfo, settings: &ModerationSettings) -> Verdict {
        let friend_ids = distinct(profile.friend_ids());
        if friend_ids.len() < MIN_FRIENDS_FOR_SCORING {
            return Verdict::Pass(profile);
        }

        let statuses = match self.store.statuses(EntityKind::User, &friend_ids).await {
            Ok(statuses) => statuses,
            Err(e) => {
                tracing::warn!(user_id = profile.id, error = %e, "Friend status lookup failed");
                return Verdict::Failed(profile.id);
            }
        };

        let mut confirmed = 0;
        let mut flagged = 0;
        for status in statuses.values() {
            match status {
                EntityStatus::Confirmed => confirmed += 1,
                EntityStatus::Flagged => flagged += 1,
                _ => {}
            }
        }
        if confirmed == 0 && flagged == 0 {
            return Verdict::Pass(profile);
        }

        let group_ids = distinct(profile.group_ids());
        if let Err(e) = self.recorder.record_memberships(profile.id, &group_ids).await {
            tracing::warn!(user_id = profile.id, error = %e, "Failed to record memberships");
            return Verdict::Failed(profile.id);
        }

        let total = friend_ids.len();
        let score = score_friend_network(confirmed, flagged, total, profile.account_age(Utc::now()));
        if score < settings.flag_threshold {
            return Verdict::Pass(profile);
        }

        let reason = format!(
            "User has {confirmed} confirmed and {flagged} flagged friends ({:.1}% total).",
            inappropriate_share(confirmed, flagged, total)
        );
        tracing::info!(user_id = profile.id, confirmed, flagged, score, "Flagging user by friend network");
        Verdict::Flag(FlagRecord::user(&profile, reason, score))
    }
}
