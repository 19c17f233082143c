use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_api::config::ServerConfig;
use warden_api::router::build_app_router;
use warden_api::state::AppState;
use warden_core::settings::{ModerationSettings, SettingsHandle};
use warden_pipeline::settings::{load_settings, SettingsRefresher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warden_api=debug,tower_http=debug"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Database ---
    let pool = warden_db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    warden_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    warden_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Settings ---
    let fallback = ModerationSettings::from_env()?;
    let initial = load_settings(&pool, &fallback)
        .await
        .context("Failed to load moderation settings")?;
    let (settings_tx, settings) = SettingsHandle::channel(initial);

    let cancel = CancellationToken::new();
    let refresher = SettingsRefresher::new(
        pool.clone(),
        settings_tx,
        fallback,
        Duration::from_secs(config.settings_refresh_secs),
    );
    let refresher_handle = tokio::spawn(refresher.run(cancel.clone()));

    // --- Router ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        settings,
    };
    let app = build_app_router(state, &config)?;

    // --- Start server ---
    let host = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "Starting server");

    let shutdown = cancel.clone();
    let drain_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    // In-flight requests get `shutdown_timeout_secs` once the signal arrives.
    let mut serve = tokio::spawn(async move { server.await });
    tokio::select! {
        joined = &mut serve => {
            cancel.cancel();
            joined.context("Server task failed")?.context("Server error")?;
        }
        () = cancel.cancelled() => {
            match tokio::time::timeout(drain_timeout, serve).await {
                Ok(joined) => joined.context("Server task failed")?.context("Server error")?,
                Err(_) => tracing::warn!("Requests still in flight after the drain timeout"),
            }
        }
    }

    let _ = tokio::time::timeout(Duration::from_secs(5), refresher_handle).await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
