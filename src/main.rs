use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use account_service::auth::TokenManager;
use account_service::config::{CounterStoreKind, ServiceConfig};
use account_service::db;
use account_service::http::{self, AppState, HttpServer};
use account_service::ratelimit::{CounterStore, MemoryCounterStore, RedisCounterStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "account-service", version, about = "User account API with shared rate limiting")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format; overrides `logging.json`
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Apply database migrations and exit
    #[arg(long)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::load(args.config.as_deref())?;

    let json = match args.log_format {
        Some(format) => format == LogFormat::Json,
        None => config.logging.json,
    };
    init_tracing(&config.logging.filter, json);

    info!("Starting Account Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        bind_addr = %config.server.bind_addr,
        by_address = config.rate_limiting.by_address.max_count,
        by_subject = config.rate_limiting.by_subject.max_count,
        "Configuration loaded"
    );

    let pool = db::connect(&config.database).await?;
    db::migrate(&pool).await?;
    if args.migrate_only {
        info!("Migrations complete, exiting");
        return Ok(());
    }

    let mut purge_task = None;
    let counter_store: Arc<dyn CounterStore> = match config.rate_limiting.store {
        CounterStoreKind::Redis => {
            let store = RedisCounterStore::connect(&config.redis.url).await?;
            info!(url = %config.redis.url, "Counter store connected");
            Arc::new(store)
        }
        CounterStoreKind::Memory => {
            let store = Arc::new(MemoryCounterStore::new());
            purge_task = Some(store.spawn_purge_task(config.rate_limiting.purge_interval()));
            info!("Using in-process counter store");
            store
        }
    };

    let tokens = TokenManager::from_config(&config.auth)?;
    let state = AppState::new(&config, counter_store, pool.clone(), tokens)?;

    let server = HttpServer::bind(config.server.bind_addr, http::router(state)).await?;
    server.serve_with_shutdown(shutdown_signal()).await?;

    if let Some(task) = purge_task {
        task.abort();
    }

    pool.close().await;
    info!("Account Service stopped");
    Ok(())
}

fn init_tracing(default_filter: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_thread_ids(true))
            .init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
