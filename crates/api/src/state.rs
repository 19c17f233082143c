use std::sync::Arc;

use warden_core::settings::SettingsHandle;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub pool: warden_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Read each request so a settings refresh applies to the next one.
    pub settings: SettingsHandle,
}
