//! Tunable moderation settings.
//!
//! Settings live in a single JSON row in the database, fall back to
//! environment variables, and are handed to components through a
//! [`SettingsHandle`]. Only the settings refresher holds the sender.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::entity::{EntityKind, ReviewSortBy, ReviewTargetMode, StatusPriority};
use crate::error::CoreError;
use crate::scoring::DEFAULT_FLAG_THRESHOLD;

/// Every tunable knob of the moderation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    /// Friend-network score at or above which a user is auto-flagged.
    pub flag_threshold: f64,
    /// Number of confirmed groups that flags a member on its own.
    pub group_confirmed_threshold: usize,
    /// Distinct tracked users at which a group qualifies for flagging.
    pub affiliation_min_users: i32,
    /// Soft lease on review claims.
    pub review_cooldown_secs: u64,
    /// Per-target-mode fallback order; missing modes use the built-in order.
    pub review_priorities: HashMap<ReviewTargetMode, StatusPriority>,
    pub default_user_sort: ReviewSortBy,
    pub default_group_sort: ReviewSortBy,
    /// Attempts per ID before a worker dead-letters it.
    pub max_retry_attempts: u32,
    /// Seeds are rescanned at most this often.
    pub rescan_after_hours: u64,
    pub purge_check_interval_hours: u64,
    pub cleared_retention_days: u64,
    pub tracking_stale_days: u64,
    pub stats_retention_days: u64,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            flag_threshold: DEFAULT_FLAG_THRESHOLD,
            group_confirmed_threshold: 2,
            affiliation_min_users: 5,
            review_cooldown_secs: 600,
            review_priorities: HashMap::new(),
            default_user_sort: ReviewSortBy::Random,
            default_group_sort: ReviewSortBy::Random,
            max_retry_attempts: 3,
            rescan_after_hours: 24,
            purge_check_interval_hours: 24,
            cleared_retention_days: 30,
            tracking_stale_days: 30,
            stats_retention_days: 30,
        }
    }
}

impl ModerationSettings {
    /// Defaults overridden by environment variables.
    ///
    /// | Env Var                         | Default  |
    /// |---------------------------------|----------|
    /// | `FLAG_THRESHOLD`                | `0.4`    |
    /// | `GROUP_CONFIRMED_THRESHOLD`     | `2`      |
    /// | `AFFILIATION_MIN_USERS`         | `5`      |
    /// | `REVIEW_COOLDOWN_SECS`          | `600`    |
    /// | `DEFAULT_USER_SORT`             | `random` |
    /// | `DEFAULT_GROUP_SORT`            | `random` |
    /// | `MAX_RETRY_ATTEMPTS`            | `3`      |
    /// | `RESCAN_AFTER_HOURS`            | `24`     |
    /// | `PURGE_CHECK_INTERVAL_HOURS`    | `24`     |
    /// | `CLEARED_RETENTION_DAYS`        | `30`     |
    /// | `TRACKING_STALE_DAYS`           | `30`     |
    /// | `STATS_RETENTION_DAYS`          | `30`     |
    pub fn from_env() -> Result<Self, CoreError> {
        let d = Self::default();
        let settings = Self {
            flag_threshold: env_or("FLAG_THRESHOLD", d.flag_threshold)?,
            group_confirmed_threshold: env_or(
                "GROUP_CONFIRMED_THRESHOLD",
                d.group_confirmed_threshold,
            )?,
            affiliation_min_users: env_or("AFFILIATION_MIN_USERS", d.affiliation_min_users)?,
            review_cooldown_secs: env_or("REVIEW_COOLDOWN_SECS", d.review_cooldown_secs)?,
            review_priorities: HashMap::new(),
            default_user_sort: env_or("DEFAULT_USER_SORT", d.default_user_sort)?,
            default_group_sort: env_or("DEFAULT_GROUP_SORT", d.default_group_sort)?,
            max_retry_attempts: env_or("MAX_RETRY_ATTEMPTS", d.max_retry_attempts)?,
            rescan_after_hours: env_or("RESCAN_AFTER_HOURS", d.rescan_after_hours)?,
            purge_check_interval_hours: env_or(
                "PURGE_CHECK_INTERVAL_HOURS",
                d.purge_check_interval_hours,
            )?,
            cleared_retention_days: env_or("CLEARED_RETENTION_DAYS", d.cleared_retention_days)?,
            tracking_stale_days: env_or("TRACKING_STALE_DAYS", d.tracking_stale_days)?,
            stats_retention_days: env_or("STATS_RETENTION_DAYS", d.stats_retention_days)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.flag_threshold > 0.0 && self.flag_threshold <= 1.0) {
            return Err(CoreError::Configuration(format!(
                "flag_threshold must be in (0, 1], got {}",
                self.flag_threshold
            )));
        }
        if self.group_confirmed_threshold == 0 {
            return Err(CoreError::Configuration(
                "group_confirmed_threshold must be at least 1".to_string(),
            ));
        }
        if self.affiliation_min_users < 1 {
            return Err(CoreError::Configuration(
                "affiliation_min_users must be at least 1".to_string(),
            ));
        }
        if self.review_cooldown_secs == 0 {
            return Err(CoreError::Configuration(
                "review_cooldown_secs must be positive".to_string(),
            ));
        }
        if self.max_retry_attempts == 0 {
            return Err(CoreError::Configuration(
                "max_retry_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a stored JSON document on top of these settings.
    ///
    /// Only the keys the document names are replaced. `null` means no
    /// overrides. The result is validated.
    pub fn overlay(&self, document: serde_json::Value) -> Result<Self, CoreError> {
        let invalid = |e: serde_json::Error| {
            CoreError::Configuration(format!("Stored moderation settings are invalid: {e}"))
        };

        let mut merged = serde_json::to_value(self).map_err(invalid)?;
        match (merged.as_object_mut(), document) {
            (Some(base), serde_json::Value::Object(overrides)) => base.extend(overrides),
            (_, serde_json::Value::Null) => {}
            (_, other) => {
                return Err(CoreError::Configuration(format!(
                    "Stored moderation settings must be a JSON object, got {other}"
                )))
            }
        }

        let settings: Self = serde_json::from_value(merged).map_err(invalid)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn review_cooldown(&self) -> Duration {
        Duration::from_secs(self.review_cooldown_secs)
    }

    /// Fallback order for a review pull in the given target mode.
    pub fn priority_for(&self, mode: ReviewTargetMode) -> StatusPriority {
        self.review_priorities
            .get(&mode)
            .cloned()
            .unwrap_or_else(|| mode.default_priority())
    }

    pub fn default_sort(&self, kind: EntityKind) -> ReviewSortBy {
        match kind {
            EntityKind::User => self.default_user_sort,
            EntityKind::Group => self.default_group_sort,
        }
    }

    pub fn rescan_after(&self) -> Duration {
        Duration::from_secs(self.rescan_after_hours * 3600)
    }

    pub fn purge_check_interval(&self) -> Duration {
        Duration::from_secs(self.purge_check_interval_hours * 3600)
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
///
/// A set but unparseable value is a configuration error.
pub fn env_or<T>(key: &str, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CoreError::Configuration(format!("{key} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Read-only view of the current settings.
///
/// Cheap to clone. Components call [`SettingsHandle::current`] at the start
/// of each unit of work so a refresh takes effect on the next batch.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    rx: watch::Receiver<Arc<ModerationSettings>>,
}

impl SettingsHandle {
    /// Create the sender owned by the refresher and the first handle.
    pub fn channel(
        initial: ModerationSettings,
    ) -> (watch::Sender<Arc<ModerationSettings>>, SettingsHandle) {
        let (tx, rx) = watch::channel(Arc::new(initial));
        (tx, SettingsHandle { rx })
    }

    /// A handle that never changes, for tests and one-shot commands.
    pub fn fixed(settings: ModerationSettings) -> Self {
        let (_tx, handle) = Self::channel(settings);
        handle
    }

    pub fn current(&self) -> Arc<ModerationSettings> {
        self.rx.borrow().clone()
    }

    /// Wait until the refresher publishes a new value.
    pub async fn changed(&mut self) -> Result<(), CoreError> {
        self.rx
            .changed()
            .await
            .map_err(|_| CoreError::Internal("settings refresher stopped".to_string()))
    }
}
