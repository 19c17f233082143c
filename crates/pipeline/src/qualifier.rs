//! Turns qualified affiliation records into flagged groups.

use std::sync::Arc;

use warden_core::capabilities::ProfileFetcher;
use warden_core::entity::EntityKind;
use warden_core::profile::{FlagRecord, GroupInfo};
use warden_core::types::EntityId;
use warden_db::models::entity::UpsertSummary;

use crate::error::PipelineError;
use crate::fanout;
use crate::store::ModerationStore;

#[derive(Clone)]
pub struct GroupQualifier {
    store: Arc<dyn ModerationStore>,
    fetcher: Arc<dyn ProfileFetcher>,
    concurrency: usize,
}

impl GroupQualifier {
    pub fn new(
        store: Arc<dyn ModerationStore>,
        fetcher: Arc<dyn ProfileFetcher>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            concurrency,
        }
    }

    /// Flag every group with at least `min_users` tracked users.
    ///
    /// Group info is fetched before anything is latched. A group whose info
    /// cannot be fetched is still flagged with the snapshot fields left
    /// empty. If saving fails or the call is cancelled, the records stay
    /// unlatched and qualify again on the next pass.
    pub async fn flag_qualified(&self, min_users: i32) -> Result<UpsertSummary, PipelineError> {
        let qualified = self.store.qualified_groups(min_users).await?;
        if qualified.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let records = fanout::bounded(qualified, self.concurrency, |(group_id, users)| async move {
            let info = match self.fetcher.fetch_group_info(group_id).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(group_id, error = %e, "Group info unavailable, flagging without snapshot");
                    placeholder(group_id)
                }
            };
            let reason = format!(
                "Affiliation: {} tracked users are members of this group",
                users.len()
            );
            FlagRecord::group(&info, &users, reason)
        })
        .await;

        let summary = self.store.flag_qualified_groups(min_users, &records).await?;
        tracing::info!(
            qualified = records.len(),
            inserted = summary.inserted.len(),
            refreshed = summary.refreshed.len(),
            skipped = summary.skipped.len(),
            "Flagged qualified groups",
        );
        Ok(summary)
    }
}

fn placeholder(group_id: EntityId) -> GroupInfo {
    GroupInfo {
        id: group_id,
        name: String::new(),
        description: String::new(),
        owner_id: None,
        member_count: 0,
        is_locked: false,
    }
}
