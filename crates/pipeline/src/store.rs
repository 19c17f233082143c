//! The persistence seam used by checkers and workers.
//!
//! [`PgStore`] is the production implementation over the repositories;
//! tests substitute an in-memory store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use warden_core::entity::{EntityKind, EntityStatus};
use warden_core::profile::FlagRecord;
use warden_core::types::EntityId;
use warden_db::models::entity::UpsertSummary;
use warden_db::repositories::{EntityRepo, TrackingRepo};

use crate::error::PipelineError;

/// Affiliation signals keyed by group, users sorted and distinct.
pub type Signals = BTreeMap<EntityId, BTreeSet<EntityId>>;

#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// Stored status of each ID; unflagged IDs are absent.
    async fn statuses(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, EntityStatus>, PipelineError>;

    async fn record_affiliations(&self, signals: &Signals) -> Result<(), PipelineError>;

    /// Insert new rows as Flagged, refresh rows still Flagged.
    async fn save_flagged(
        &self,
        kind: EntityKind,
        records: &[FlagRecord],
    ) -> Result<UpsertSummary, PipelineError>;

    /// Unlatched groups with at least `min_users` tracked users. Reading
    /// does not latch.
    async fn qualified_groups(
        &self,
        min_users: i32,
    ) -> Result<BTreeMap<EntityId, Vec<EntityId>>, PipelineError>;

    /// Latch the groups among `records` that still qualify and save them as
    /// flagged, as one unit. On error nothing is latched, so the groups are
    /// offered again by the next [`qualified_groups`](Self::qualified_groups).
    async fn flag_qualified_groups(
        &self,
        min_users: i32,
        records: &[FlagRecord],
    ) -> Result<UpsertSummary, PipelineError>;
}

/// [`ModerationStore`] backed by Postgres.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ModerationStore for PgStore {
    async fn statuses(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, EntityStatus>, PipelineError> {
        Ok(EntityRepo::statuses(&self.pool, kind, ids).await?)
    }

    async fn record_affiliations(&self, signals: &Signals) -> Result<(), PipelineError> {
        Ok(TrackingRepo::record_signals(&self.pool, signals, Utc::now()).await?)
    }

    async fn save_flagged(
        &self,
        kind: EntityKind,
        records: &[FlagRecord],
    ) -> Result<UpsertSummary, PipelineError> {
        Ok(EntityRepo::bulk_upsert_flagged(&self.pool, kind, records).await?)
    }

    async fn qualified_groups(
        &self,
        min_users: i32,
    ) -> Result<BTreeMap<EntityId, Vec<EntityId>>, PipelineError> {
        Ok(TrackingRepo::qualified(&self.pool, min_users).await?)
    }

    async fn flag_qualified_groups(
        &self,
        min_users: i32,
        records: &[FlagRecord],
    ) -> Result<UpsertSummary, PipelineError> {
        let ids: Vec<EntityId> = records.iter().map(|r| r.id).collect();

        let mut tx = self.pool.begin().await?;
        let drained =
            TrackingRepo::drain_qualified_in(&mut *tx, min_users, Some(ids.as_slice())).await?;
        // Another worker may have latched some of these in the meantime.
        let owned: Vec<FlagRecord> = records
            .iter()
            .filter(|r| drained.contains_key(&r.id))
            .cloned()
            .collect();
        let summary =
            EntityRepo::bulk_upsert_flagged_in(&mut *tx, EntityKind::Group, &owned).await?;
        tx.commit().await?;
        Ok(summary)
    }
}
