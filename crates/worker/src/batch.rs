//! Batch assembly for the scan workers.
//!
//! A [`CandidateSource`] expands one seed at a time into candidate user IDs.
//! The [`BatchAssembler`] keeps pulling, drops IDs that already have a
//! status or were seen in this batch, and stops at the target size.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use warden_core::capabilities::{MembershipLister, ProfileFetcher};
use warden_core::entity::EntityKind;
use warden_core::settings::SettingsHandle;
use warden_core::types::EntityId;
use warden_db::repositories::EntityRepo;
use warden_pipeline::store::ModerationStore;
use warden_pipeline::PipelineError;

/// Seeds pulled per batch before giving up on filling it.
const MAX_PULLS_PER_BATCH: usize = 50;

#[async_trait]
pub trait CandidateSource: Send {
    /// Candidates from the next seed. `Ok(None)` means no seed is available
    /// right now.
    async fn next_candidates(&mut self) -> Result<Option<Vec<EntityId>>, PipelineError>;
}

/// Friends of Confirmed (then Flagged) users.
pub struct FriendSource {
    pool: PgPool,
    fetcher: Arc<dyn ProfileFetcher>,
    settings: SettingsHandle,
}

impl FriendSource {
    pub fn new(pool: PgPool, fetcher: Arc<dyn ProfileFetcher>, settings: SettingsHandle) -> Self {
        Self {
            pool,
            fetcher,
            settings,
        }
    }
}

#[async_trait]
impl CandidateSource for FriendSource {
    async fn next_candidates(&mut self) -> Result<Option<Vec<EntityId>>, PipelineError> {
        let rescan_after = self.settings.current().rescan_after();
        let Some(seed) =
            EntityRepo::claim_next_to_scan(&self.pool, EntityKind::User, rescan_after, Utc::now())
                .await?
        else {
            return Ok(None);
        };

        match self.fetcher.fetch_friends(seed.id).await {
            Ok(friends) => {
                tracing::debug!(seed = seed.id, friends = friends.len(), "Expanded seed friends");
                Ok(Some(friends.into_iter().map(|f| f.id).collect()))
            }
            Err(e) => {
                tracing::warn!(seed = seed.id, error = %e, "Failed to expand seed friends");
                Ok(Some(Vec::new()))
            }
        }
    }
}

/// Members of Confirmed (then Flagged) groups, one page per pull.
///
/// The listing cursor survives across batches so a large group is walked
/// to the end before the next group is claimed.
pub struct MemberSource {
    pool: PgPool,
    lister: Arc<dyn MembershipLister>,
    settings: SettingsHandle,
    current: Option<(EntityId, Option<String>)>,
}

impl MemberSource {
    pub fn new(pool: PgPool, lister: Arc<dyn MembershipLister>, settings: SettingsHandle) -> Self {
        Self {
            pool,
            lister,
            settings,
            current: None,
        }
    }
}

#[async_trait]
impl CandidateSource for MemberSource {
    async fn next_candidates(&mut self) -> Result<Option<Vec<EntityId>>, PipelineError> {
        let (group_id, cursor) = match self.current.take() {
            Some(state) => state,
            None => {
                let rescan_after = self.settings.current().rescan_after();
                let claimed = EntityRepo::claim_next_to_scan(
                    &self.pool,
                    EntityKind::Group,
                    rescan_after,
                    Utc::now(),
                )
                .await?;
                match claimed {
                    Some(group) => (group.id, None),
                    None => return Ok(None),
                }
            }
        };

        match self.lister.list_group_members(group_id, cursor.as_deref()).await {
            Ok(page) => {
                if let Some(next) = page.next_cursor {
                    self.current = Some((group_id, Some(next)));
                }
                tracing::debug!(group_id, members = page.members.len(), "Listed group members");
                Ok(Some(page.members))
            }
            Err(e) => {
                // Resume from the same page next time.
                tracing::warn!(group_id, error = %e, "Failed to list group members");
                self.current = Some((group_id, cursor));
                Err(PipelineError::Fetch {
                    id: group_id,
                    source: e,
                })
            }
        }
    }
}

pub struct BatchAssembler {
    store: Arc<dyn ModerationStore>,
    batch_size: usize,
    /// Fresh candidates past the batch size, used first next time.
    overflow: Vec<EntityId>,
}

impl BatchAssembler {
    pub fn new(store: Arc<dyn ModerationStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            overflow: Vec::new(),
        }
    }

    /// Build the next batch, starting with `carried` retries.
    pub async fn assemble(
        &mut self,
        source: &mut dyn CandidateSource,
        carried: &[EntityId],
    ) -> Result<Vec<EntityId>, PipelineError> {
        let mut seen = HashSet::new();
        let mut batch: Vec<EntityId> = Vec::with_capacity(self.batch_size);
        for &id in carried {
            if seen.insert(id) {
                batch.push(id);
            }
        }

        let overflow = std::mem::take(&mut self.overflow);
        self.admit(overflow, &mut seen, &mut batch).await?;

        let mut pulls = 0;
        while batch.len() < self.batch_size && pulls < MAX_PULLS_PER_BATCH {
            pulls += 1;
            match source.next_candidates().await? {
                Some(candidates) => self.admit(candidates, &mut seen, &mut batch).await?,
                None => break,
            }
        }
        Ok(batch)
    }

    /// Append unseen candidates without a status, spilling past the target
    /// size into `overflow`.
    async fn admit(
        &mut self,
        candidates: Vec<EntityId>,
        seen: &mut HashSet<EntityId>,
        batch: &mut Vec<EntityId>,
    ) -> Result<(), PipelineError> {
        let fresh: Vec<EntityId> = candidates.into_iter().filter(|id| seen.insert(*id)).collect();
        if fresh.is_empty() {
            return Ok(());
        }

        let known = self.store.statuses(EntityKind::User, &fresh).await?;
        for id in fresh.into_iter().filter(|id| !known.contains_key(id)) {
            if batch.len() < self.batch_size {
                batch.push(id);
            } else {
                self.overflow.push(id);
            }
        }
        Ok(())
    }
}
