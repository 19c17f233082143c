//! Loading and refreshing the effective moderation settings.
//!
//! Each process runs one [`SettingsRefresher`], the single owner of its
//! settings channel.
//!
//! The stored document is overlaid on the environment fallback, so a
//! partial document only overrides the keys it names.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use warden_core::settings::ModerationSettings;
use warden_db::repositories::SettingsRepo;
use crate::PipelineError;

/// Load and validate the effective settings.
pub async fn load_settings(
    pool: &PgPool,
    fallback: &ModerationSettings,
) -> Result<ModerationSettings, PipelineError> {
    match SettingsRepo::load(pool).await? {
        Some((document, _updated_at)) => Ok(fallback.overlay(document)?),
        None => Ok(fallback.clone()),
    }
}

pub struct SettingsRefresher {
    pool: PgPool,
    tx: watch::Sender<Arc<ModerationSettings>>,
    fallback: ModerationSettings,
    interval: Duration,
}

impl SettingsRefresher {
    pub fn new(
        pool: PgPool,
        tx: watch::Sender<Arc<ModerationSettings>>,
        fallback: ModerationSettings,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            tx,
            fallback,
            interval,
        }
    }

    /// Poll until cancelled. A bad document is logged and the previous
    /// settings stay in force.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Settings refresher stopping");
                    break;
                }
                _ = interval.tick() => self.refresh().await,
            }
        }
    }

    async fn refresh(&self) {
        match load_settings(&self.pool, &self.fallback).await {
            Ok(settings) => {
                let changed = self.tx.send_if_modified(|current| {
                    if **current == settings {
                        false
                    } else {
                        *current = Arc::new(settings);
                        true
                    }
                });
                if changed {
                    tracing::info!("Moderation settings updated");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Settings refresh failed, keeping current settings");
            }
        }
    }
}
