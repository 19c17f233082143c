//! Batch checkers.
//!
//! Each checker runs one task per profile under a bounded fan-out and
//! joins them before returning. A task that errors lands in `failed`; it
//! never affects its siblings.

mod ai;
mod friend;
mod group;
mod user;

use warden_core::profile::{FlagRecord, ProfileInfo};
use warden_core::types::EntityId;

pub use ai::AiChecker;
pub use friend::FriendChecker;
pub use group::GroupChecker;
pub use user::{CheckReport, UserChecker};

/// Result of running one checker over a batch.
#[derive(Debug, Default)]
pub struct CheckOutcome {
    pub flagged: Vec<FlagRecord>,
    /// Profiles this checker did not flag, for the next checker.
    pub remaining: Vec<ProfileInfo>,
    pub failed: Vec<EntityId>,
}

impl CheckOutcome {
    pub fn flagged_ids(&self) -> Vec<EntityId> {
        self.flagged.iter().map(|r| r.id).collect()
    }
}

/// Per-profile result of a checker task.
pub(crate) enum Verdict {
    Flag(FlagRecord),
    Pass(ProfileInfo),
    Failed(EntityId),
}

impl FromIterator<Verdict> for CheckOutcome {
    fn from_iter<I: IntoIterator<Item = Verdict>>(iter: I) -> Self {
        let mut outcome = CheckOutcome::default();
        for verdict in iter {
            match verdict {
                Verdict::Flag(record) => outcome.flagged.push(record),
                Verdict::Pass(profile) => outcome.remaining.push(profile),
                Verdict::Failed(id) => outcome.failed.push(id),
            }
        }
        outcome
    }
}

/// Sorted, distinct copy of `ids`.
pub(crate) fn distinct(mut ids: Vec<EntityId>) -> Vec<EntityId> {
    ids.sort_unstable();
    ids.dedup();
    ids
}
