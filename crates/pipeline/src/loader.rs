//! Assembles [`ProfileInfo`] from per-field fetches.

use std::sync::Arc;

use chrono::Utc;
use warden_core::capabilities::ProfileFetcher;
use warden_core::error::CoreError;
use warden_core::profile::ProfileInfo;
use warden_core::types::EntityId;

use crate::error::PipelineError;
use crate::fanout;

/// Profiles loaded for one batch.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub profiles: Vec<ProfileInfo>,
    /// Basic info could not be fetched.
    pub failed: Vec<EntityId>,
    /// Already banned on the platform; not worth analyzing.
    pub skipped: Vec<EntityId>,
}

#[derive(Clone)]
pub struct ProfileLoader {
    fetcher: Arc<dyn ProfileFetcher>,
    concurrency: usize,
}

impl ProfileLoader {
    pub fn new(fetcher: Arc<dyn ProfileFetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency,
        }
    }

    /// Load one profile. Returns `Ok(None)` for banned accounts.
    ///
    /// Failure to fetch basic info fails the profile; every other field
    /// falls back to its empty value.
    pub async fn load(&self, user_id: EntityId) -> Result<Option<ProfileInfo>, PipelineError> {
        let info = self
            .fetcher
            .fetch_user_info(user_id)
            .await
            .map_err(|source| PipelineError::Fetch {
                id: user_id,
                source,
            })?;
        if info.is_banned {
            return Ok(None);
        }

        let (friends, groups, games, outfits, follows) = tokio::join!(
            self.fetcher.fetch_friends(user_id),
            self.fetcher.fetch_groups(user_id),
            self.fetcher.fetch_games(user_id),
            self.fetcher.fetch_outfits(user_id),
            self.fetcher.fetch_follow_counts(user_id),
        );

        let mut profile = ProfileInfo::from_basic(info, Utc::now());
        profile.friends = or_empty(user_id, "friends", friends);
        profile.groups = or_empty(user_id, "groups", groups);
        profile.games = or_empty(user_id, "games", games);
        profile.outfits = or_empty(user_id, "outfits", outfits);
        let follows = or_empty(user_id, "follow_counts", follows);
        profile.follower_count = follows.followers;
        profile.following_count = follows.following;
        Ok(Some(profile))
    }

    pub async fn load_many(&self, user_ids: &[EntityId]) -> LoadOutcome {
        let results = fanout::bounded(user_ids.iter().copied(), self.concurrency, |id| async move {
            (id, self.load(id).await)
        })
        .await;

        let mut outcome = LoadOutcome::default();
        for (id, result) in results {
            match result {
                Ok(Some(profile)) => outcome.profiles.push(profile),
                Ok(None) => outcome.skipped.push(id),
                Err(e) => {
                    tracing::warn!(user_id = id, error = %e, "Failed to load profile");
                    outcome.failed.push(id);
                }
            }
        }
        outcome
    }
}

fn or_empty<T: Default>(user_id: EntityId, field: &'static str, result: Result<T, CoreError>) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(user_id, field, error = %e, "Profile field unavailable, using empty value");
        T::default()
    })
}
