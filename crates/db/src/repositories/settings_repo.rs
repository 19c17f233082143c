//! Repository for the single-row `moderation_settings` document.

use sqlx::PgPool;
use warden_core::types::Timestamp;

pub struct SettingsRepo;

impl SettingsRepo {
    /// The stored document and when it was last written.
    pub async fn load(
        pool: &PgPool,
    ) -> Result<Option<(serde_json::Value, Timestamp)>, sqlx::Error> {
        sqlx::query_as("SELECT settings, updated_at FROM moderation_settings WHERE id = 1")
            .fetch_optional(pool)
            .await
    }

    pub async fn save(pool: &PgPool, settings: &serde_json::Value) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO moderation_settings (id, settings, updated_at) VALUES (1, $1, NOW()) \
             ON CONFLICT (id) DO UPDATE SET settings = EXCLUDED.settings, updated_at = NOW()",
        )
        .bind(settings)
        .execute(pool)
        .await?;
        Ok(())
    }
}
