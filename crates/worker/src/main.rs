use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use warden_core::capabilities::{Classifier, MembershipLister, ProfileFetcher, ThumbnailFetcher};
use warden_core::settings::{ModerationSettings, SettingsHandle};
use warden_pipeline::loader::ProfileLoader;
use warden_pipeline::qualifier::GroupQualifier;
use warden_pipeline::recorder::{AffiliationRecorder, RecorderConfig};
use warden_pipeline::settings::{load_settings, SettingsRefresher};
use warden_pipeline::store::ModerationStore;
use warden_pipeline::{PgStore, UserChecker};
use warden_worker::batch::{BatchAssembler, CandidateSource, FriendSource, MemberSource};
use warden_worker::clients::{GatewayClient, HttpClassifier};
use warden_worker::config::WorkerConfig;
use warden_worker::supervisor::supervise;
use warden_worker::telemetry;
use warden_worker::workers::purge::PurgeWorker;
use warden_worker::workers::queue::QueueWorker;
use warden_worker::workers::scan::ScanWorker;
use warden_worker::workers::stats::StatsWorker;

#[derive(Debug, Parser)]
#[command(name = "warden-worker", about = "Moderation worker pool", long_about = None)]
struct Cli {
    /// Which workers to run. Defaults to all of them.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run every worker
    Run,
    /// Scan friends of confirmed and flagged users
    Friend,
    /// Scan members of confirmed and flagged groups
    Member,
    /// Drain the recheck queue
    Queue,
    /// Detect removed entities and purge expired rows
    Purge,
    /// Take hourly status snapshots
    Stats,
    /// Apply database migrations and exit
    Migrate,
}

impl Command {
    fn runs(self, worker: Command) -> bool {
        self == Command::Run || self == worker
    }
}

/// Shared handles every worker is built from.
#[derive(Clone)]
struct Deps {
    pool: PgPool,
    store: Arc<dyn ModerationStore>,
    gateway: Arc<GatewayClient>,
    classifier: Option<Arc<dyn Classifier>>,
    recorder: AffiliationRecorder,
    settings: SettingsHandle,
    config: Arc<WorkerConfig>,
}

impl Deps {
    fn checker(&self) -> UserChecker {
        let thumbnails: Arc<dyn ThumbnailFetcher> = self.gateway.clone();
        let checker = UserChecker::with_concurrency(
            self.store.clone(),
            self.recorder.clone(),
            thumbnails,
            self.settings.clone(),
            self.config.concurrency,
        );
        match &self.classifier {
            Some(classifier) => checker.with_classifier(classifier.clone(), self.config.concurrency),
            None => checker,
        }
    }

    fn fetcher(&self) -> Arc<dyn ProfileFetcher> {
        self.gateway.clone()
    }

    fn scan_worker<S: CandidateSource + 'static>(
        &self,
        name: String,
        source: S,
    ) -> ScanWorker<S> {
        ScanWorker::new(
            name,
            source,
            BatchAssembler::new(self.store.clone(), self.config.batch_size),
            ProfileLoader::new(self.fetcher(), self.config.concurrency),
            self.checker(),
            self.recorder.clone(),
            GroupQualifier::new(self.store.clone(), self.fetcher(), self.config.concurrency),
            self.settings.clone(),
            self.config.loop_timing(),
        )
    }

    fn friend_source(&self) -> FriendSource {
        FriendSource::new(self.pool.clone(), self.fetcher(), self.settings.clone())
    }

    fn member_source(&self) -> MemberSource {
        let lister: Arc<dyn MembershipLister> = self.gateway.clone();
        MemberSource::new(self.pool.clone(), lister, self.settings.clone())
    }

    fn queue_worker(&self) -> QueueWorker {
        QueueWorker::new(
            self.pool.clone(),
            ProfileLoader::new(self.fetcher(), self.config.concurrency),
            self.checker(),
            self.recorder.clone(),
            self.fetcher(),
            self.config.queue_batch_size,
            Duration::from_secs(self.config.stale_processing_mins * 60),
            self.config.loop_timing(),
        )
    }

    fn purge_worker(&self) -> PurgeWorker {
        PurgeWorker::new(
            self.pool.clone(),
            self.fetcher(),
            self.settings.clone(),
            self.config.purge_batch_size,
            Duration::from_secs(self.config.purge_poll_secs),
            Duration::from_secs(self.config.queue_retention_days * 86_400),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("warden_worker=debug,warden_pipeline=debug");

    let command = Cli::parse().command.unwrap_or(Command::Run);

    // --- Configuration ---
    let config = Arc::new(WorkerConfig::from_env()?);
    tracing::info!(?command, gateway = %config.gateway_url, "Loaded worker configuration");

    // --- Database ---
    let pool = warden_db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    warden_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    if command == Command::Migrate {
        warden_db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database migrations applied");
        return Ok(());
    }

    // --- Settings ---
    let fallback = ModerationSettings::from_env()?;
    let initial = load_settings(&pool, &fallback)
        .await
        .context("Failed to load moderation settings")?;
    let (settings_tx, settings) = SettingsHandle::channel(initial);

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let refresher = SettingsRefresher::new(
        pool.clone(),
        settings_tx,
        fallback,
        Duration::from_secs(config.settings_refresh_secs),
    );
    tasks.spawn(refresher.run(cancel.clone()));

    // --- Capabilities ---
    let http_timeout = Duration::from_secs(config.http_timeout_secs);
    let gateway = Arc::new(GatewayClient::new(&config.gateway_url, http_timeout)?);
    let classifier: Option<Arc<dyn Classifier>> = match &config.classifier_url {
        Some(url) => Some(Arc::new(HttpClassifier::new(url, http_timeout)?)),
        None => {
            tracing::info!("CLASSIFIER_URL not set, AI checker disabled");
            None
        }
    };

    let store: Arc<dyn ModerationStore> = Arc::new(PgStore::new(pool.clone()));
    let (recorder, recorder_task) = AffiliationRecorder::spawn(store.clone(), RecorderConfig::default());

    let deps = Deps {
        pool,
        store,
        gateway,
        classifier,
        recorder,
        settings,
        config: config.clone(),
    };
    let restart_delay = Duration::from_secs(config.restart_delay_secs);

    // --- Workers ---
    if command.runs(Command::Friend) {
        for i in 0..config.friend_workers {
            let name = format!("friend-{i}");
            let deps = deps.clone();
            let worker_cancel = cancel.clone();
            let worker_name = name.clone();
            tasks.spawn(supervise(name, restart_delay, cancel.clone(), move || {
                deps.scan_worker(worker_name.clone(), deps.friend_source())
                    .run(worker_cancel.clone())
            }));
        }
    }

    if command.runs(Command::Member) {
        for i in 0..config.member_workers {
            let name = format!("member-{i}");
            let deps = deps.clone();
            let worker_cancel = cancel.clone();
            let worker_name = name.clone();
            tasks.spawn(supervise(name, restart_delay, cancel.clone(), move || {
                deps.scan_worker(worker_name.clone(), deps.member_source())
                    .run(worker_cancel.clone())
            }));
        }
    }

    if command.runs(Command::Queue) {
        let deps = deps.clone();
        let worker_cancel = cancel.clone();
        tasks.spawn(supervise("queue".into(), restart_delay, cancel.clone(), move || {
            deps.queue_worker().run(worker_cancel.clone())
        }));
    }

    if command.runs(Command::Purge) {
        let deps = deps.clone();
        let worker_cancel = cancel.clone();
        tasks.spawn(supervise("purge".into(), restart_delay, cancel.clone(), move || {
            deps.purge_worker().run(worker_cancel.clone())
        }));
    }

    if command.runs(Command::Stats) {
        let deps = deps.clone();
        let worker_cancel = cancel.clone();
        tasks.spawn(supervise("stats".into(), restart_delay, cancel.clone(), move || {
            StatsWorker::new(deps.pool.clone(), deps.settings.clone()).run(worker_cancel.clone())
        }));
    }

    tracing::info!(tasks = tasks.len(), "Workers started");

    shutdown_signal().await;
    cancel.cancel();

    let drain = async { while tasks.join_next().await.is_some() {} };
    if tokio::time::timeout(Duration::from_secs(30), drain).await.is_err() {
        tracing::warn!("Workers did not stop in time, aborting");
        tasks.shutdown().await;
    }

    // The flusher writes pending signals once the last recorder handle is gone.
    drop(deps);
    let _ = tokio::time::timeout(Duration::from_secs(10), recorder_task).await;

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
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
