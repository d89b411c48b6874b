//! tenantq worker - Main Entry Point
//! Runs a pool of workers against the shared SQLite queue

mod settings;

use anyhow::{Context, Result};
use settings::Settings;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tenantq_core::application::{
    shutdown_channel, CompletionBus, ContextMarkerListener, HandlerRegistry, RecoveryService,
    RetryPolicy, Worker, WorkerExit,
};
use tenantq_core::error::AppError;
use tenantq_core::port::time_provider::SystemTimeProvider;
use tenantq_core::port::TimeProvider;
use tenantq_infra_sqlite::{
    create_pool, file_url, run_migrations, SqliteJobQueue, SqliteRestartSignal,
    SqliteTenantDirectory, SqliteUserStore,
};
use tenantq_infra_system::FsMarkerWriter;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let settings = Settings::load()?;

    // 2. Initialize logging (guard flushes the file writer on exit)
    let _log_guard = init_logging(&settings)?;

    info!("tenantq worker v{} starting...", VERSION);
    info!(
        db_path = %settings.db_path,
        base_path = %settings.base_path,
        queue = %settings.queue,
        workers = settings.workers,
        "Configuration loaded"
    );

    // 3. Initialize database
    if let Some(parent) = Path::new(&settings.db_path).parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    let pool = create_pool(&file_url(&settings.db_path))
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let retry_policy = Arc::new(RetryPolicy::new(
        time_provider.clone(),
        settings.retry_base_delay_ms,
    ));
    let queue = Arc::new(SqliteJobQueue::new(
        pool.clone(),
        time_provider.clone(),
        retry_policy,
    ));
    let tenants = Arc::new(SqliteTenantDirectory::new(pool.clone()));
    let users = Arc::new(SqliteUserStore::new(pool.clone(), time_provider.clone()));
    let markers = Arc::new(FsMarkerWriter::new(&settings.base_path));
    let restart_signal = Arc::new(SqliteRestartSignal::new(pool.clone()));

    // 5. Run crash recovery
    info!("Running crash recovery...");
    let recovery_service = RecoveryService::new(
        queue.clone(),
        time_provider.clone(),
        Some(settings.recovery_window_ms),
    );
    match recovery_service.recover_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => error!(error = ?e, "Crash recovery failed"),
    }

    // 6. Completion listeners
    let bus = CompletionBus::new();
    bus.subscribe(Arc::new(ContextMarkerListener::new(markers.clone())));

    // 7. Start workers
    let worker = Worker::builder()
        .config(settings.worker_config())
        .queue(queue)
        .tenants(tenants)
        .handlers(HandlerRegistry::with_defaults(users, markers))
        .bus(bus)
        .restart_signal(restart_signal)
        .time_provider(time_provider)
        .build()
        .context("Worker wiring failed")?;

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut workers = JoinSet::new();
    for n in 1..=settings.workers {
        let worker = worker.named(format!("worker-{}", n));
        let token = shutdown_rx.clone();
        workers.spawn(async move { worker.run(token).await });
    }

    info!("System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal, or for every worker to leave on restart
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received. Exiting gracefully...");
        }
        _ = drain(&mut workers) => {
            info!("All workers stopped");
        }
    }

    // 9. Graceful shutdown: in-flight jobs are released back to the queue
    shutdown_tx.shutdown();
    if tokio::time::timeout(SHUTDOWN_GRACE, drain(&mut workers))
        .await
        .is_err()
    {
        warn!("Workers did not stop within the grace period");
        workers.abort_all();
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}

/// Wait for every worker task, logging why each one stopped
async fn drain(workers: &mut JoinSet<std::result::Result<WorkerExit, AppError>>) {
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(WorkerExit::Restart)) => info!("Worker exited for restart"),
            Ok(Ok(WorkerExit::Shutdown)) => info!("Worker exited on shutdown"),
            Ok(Err(e)) => error!(error = %e, "Worker failed"),
            Err(e) => error!(error = %e, "Worker task crashed"),
        }
    }
}

fn init_logging(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("tenantq=info"))
        .context("Failed to create env filter")?;

    // Optional file output, always JSON
    let (file_layer, guard) = match &settings.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tenantq-worker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match settings.log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            registry.with(fmt::layer().json()).init();
        }
        _ => {
            // Development: Pretty formatting with colors
            registry.with(fmt::layer().pretty()).init();
        }
    }

    Ok(guard)
}
