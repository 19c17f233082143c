use std::time::Duration;

use warden_core::error::CoreError;
use warden_core::settings::env_or;

/// Worker process configuration loaded from environment variables.
///
/// Moderation tunables live in [`warden_core::settings::ModerationSettings`];
/// this only covers process wiring.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Base URL of the platform gateway serving profiles and memberships.
    pub gateway_url: String,
    /// Classifier endpoint. The AI checker is disabled when unset.
    pub classifier_url: Option<String>,
    pub http_timeout_secs: u64,
    /// Target number of user IDs per scan batch.
    pub batch_size: usize,
    /// In-flight tasks per checker and loader.
    pub concurrency: usize,
    pub batch_timeout_secs: u64,
    /// Pause after a failed or timed-out batch.
    pub failure_backoff_secs: u64,
    /// Pause before the supervisor restarts a crashed worker.
    pub restart_delay_secs: u64,
    /// Pause when no work is available.
    pub idle_poll_secs: u64,
    pub settings_refresh_secs: u64,
    pub friend_workers: usize,
    pub member_workers: usize,
    pub queue_batch_size: usize,
    pub stale_processing_mins: u64,
    pub queue_retention_days: u64,
    pub purge_batch_size: i64,
    pub purge_poll_secs: u64,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `DATABASE_URL`           | required                |
    /// | `DB_MAX_CONNECTIONS`     | `10`                    |
    /// | `GATEWAY_URL`            | `http://localhost:8080` |
    /// | `CLASSIFIER_URL`         | unset                   |
    /// | `HTTP_TIMEOUT_SECS`      | `30`                    |
    /// | `BATCH_SIZE`             | `100`                   |
    /// | `CONCURRENCY`            | `16`                    |
    /// | `BATCH_TIMEOUT_SECS`     | `600`                   |
    /// | `FAILURE_BACKOFF_SECS`   | `300`                   |
    /// | `RESTART_DELAY_SECS`     | `10`                    |
    /// | `IDLE_POLL_SECS`         | `30`                    |
    /// | `SETTINGS_REFRESH_SECS`  | `60`                    |
    /// | `FRIEND_WORKERS`         | `1`                     |
    /// | `MEMBER_WORKERS`         | `1`                     |
    /// | `QUEUE_BATCH_SIZE`       | `20`                    |
    /// | `STALE_PROCESSING_MINS`  | `30`                    |
    /// | `QUEUE_RETENTION_DAYS`   | `7`                     |
    /// | `PURGE_BATCH_SIZE`       | `100`                   |
    /// | `PURGE_POLL_SECS`        | `300`                   |
    pub fn from_env() -> Result<Self, CoreError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| CoreError::Configuration("DATABASE_URL must be set".into()))?;
        let classifier_url = std::env::var("CLASSIFIER_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let config = Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10)?,
            gateway_url: env_or("GATEWAY_URL", "http://localhost:8080".to_string())?,
            classifier_url,
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", 30)?,
            batch_size: env_or("BATCH_SIZE", 100)?,
            concurrency: env_or("CONCURRENCY", 16)?,
            batch_timeout_secs: env_or("BATCH_TIMEOUT_SECS", 600)?,
            failure_backoff_secs: env_or("FAILURE_BACKOFF_SECS", 300)?,
            restart_delay_secs: env_or("RESTART_DELAY_SECS", 10)?,
            idle_poll_secs: env_or("IDLE_POLL_SECS", 30)?,
            settings_refresh_secs: env_or("SETTINGS_REFRESH_SECS", 60)?,
            friend_workers: env_or("FRIEND_WORKERS", 1)?,
            member_workers: env_or("MEMBER_WORKERS", 1)?,
            queue_batch_size: env_or("QUEUE_BATCH_SIZE", 20)?,
            stale_processing_mins: env_or("STALE_PROCESSING_MINS", 30)?,
            queue_retention_days: env_or("QUEUE_RETENTION_DAYS", 7)?,
            purge_batch_size: env_or("PURGE_BATCH_SIZE", 100)?,
            purge_poll_secs: env_or("PURGE_POLL_SECS", 300)?,
        };
        if config.batch_size == 0 {
            return Err(CoreError::Configuration("BATCH_SIZE must be positive".into()));
        }
        Ok(config)
    }

    pub fn loop_timing(&self) -> LoopTiming {
        LoopTiming {
            batch_timeout: Duration::from_secs(self.batch_timeout_secs),
            failure_backoff: Duration::from_secs(self.failure_backoff_secs),
            idle_poll: Duration::from_secs(self.idle_poll_secs),
        }
    }
}

/// Pacing shared by the batch loops.
#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    pub batch_timeout: Duration,
    pub failure_backoff: Duration,
    pub idle_poll: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            batch_timeout: Duration::from_secs(600),
            failure_backoff: Duration::from_secs(300),
            idle_poll: Duration::from_secs(30),
        }
    }
}
