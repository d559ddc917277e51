//! Tally Jobs - Daemon Entry Point
//! Workers per queue + lease reaper + JSON-RPC server over one SQLite broker

mod settings;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use settings::{DaemonConfig, LogFormat};
use tally_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use tally_core::application::{
    shutdown_channel, HandlerDeps, JobRegistry, LeaseReaper, RetryPolicy, Worker,
};
use tally_core::domain::QueueName;
use tally_core::port::id_provider::UuidProvider;
use tally_core::port::time_provider::SystemTimeProvider;
use tally_core::port::{JobBroker, TimeProvider};
use tally_infra_sqlite::{create_pool, run_migrations, SqliteJobBroker, SqliteRecordStore};
use tally_infra_system::{OutboxMailTransport, TextDocumentRenderer};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_LOG_FILTER: &str = "tally=info";
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Install the global subscriber. The guard must live as long as file logging is needed.
fn init_tracing(cfg: &DaemonConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Failed to create env filter")?;

    let (writer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tallyd.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };
    let ansi = cfg.log_dir.is_none();

    match cfg.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_ansi(ansi).with_writer(writer))
            .try_init()?,
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration, then logging
    let cfg = DaemonConfig::load()?;
    let _log_guard = init_tracing(&cfg)?;

    info!("Tally Jobs v{} starting...", VERSION);

    // 2. Database
    if let Some(dir) = cfg.db_dir() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create database directory {}", dir.display()))?;
    }
    info!(db = %cfg.database_url(), "Initializing database...");
    let pool = create_pool(&cfg.database_url())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. Adapters (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let broker: Arc<dyn JobBroker> = Arc::new(SqliteJobBroker::new(
        pool.clone(),
        Arc::new(UuidProvider),
        time_provider.clone(),
    ));
    let records = Arc::new(SqliteRecordStore::new(pool.clone()));
    let mail = Arc::new(OutboxMailTransport::new(
        &cfg.outbox_dir,
        &cfg.mail_from,
        time_provider.clone(),
    ));
    let renderer = Arc::new(TextDocumentRenderer::new(
        &cfg.document_dir,
        cfg.document_base_url.clone(),
    ));

    let registry = Arc::new(JobRegistry::standard(HandlerDeps {
        invoices: records.clone(),
        leads: records.clone(),
        mail,
        renderer,
        time_provider: time_provider.clone(),
    }));
    for kind in registry.missing() {
        warn!(kind = %kind, "No handler registered; such jobs will fail");
    }

    // 4. JSON-RPC server
    let rpc_server = RpcServer::new(
        RpcServerConfig {
            host: cfg.rpc_host.clone(),
            port: cfg.rpc_port,
        },
        RpcHandler::new(broker.clone(), records.clone(), time_provider.clone()),
    );
    let (rpc_addr, rpc_handle) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 5. Workers, one pool per queue
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let retry_policy = Arc::new(RetryPolicy::new(time_provider.clone()));
    let mut tasks = Vec::new();

    for queue in QueueName::ALL {
        for slot in 0..cfg.workers_per_queue {
            let worker = Worker::new(
                queue,
                broker.clone(),
                registry.clone(),
                retry_policy.clone(),
            )
            .with_lease_ms(cfg.lease_ms);
            let token = shutdown_tx.token();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = worker.run(token).await {
                    error!(queue = %queue, slot, error = %e, "Worker failed");
                }
            }));
        }
    }

    // 6. Lease reaper
    let reaper = LeaseReaper::new(broker.clone(), Some(cfg.reaper_interval()));
    tasks.push(tokio::spawn(async move {
        if let Err(e) = reaper.run(shutdown_rx).await {
            error!(error = %e, "Lease reaper failed");
        }
    }));

    info!(
        rpc = %rpc_addr,
        workers_per_queue = cfg.workers_per_queue,
        "System ready. Press Ctrl+C to shutdown"
    );

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown: in-flight jobs finish, leases cover the rest
    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    for task in tasks {
        if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            warn!("Task did not stop within grace period");
        }
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
