use anyhow::Result;
use clap::Parser;
use roundtable_api::api::build_router;
use roundtable_api::state::AppState;
use roundtable_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use roundtable_core::{ChatStore, Config};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "roundtable-api")]
#[command(author, version, about = "Multi-tenant group chat HTTP API", long_about = None)]
struct Args {
    /// Path to a TOML configuration file (environment variables are
    /// read when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configured bind address
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let log_level = LogLevel::from_str(&config.logging.level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}', using 'info'", config.logging.level);
        LogLevel::Info
    });
    let log_config = LogConfig::new(log_level)
        .with_timestamp(config.logging.with_timestamp)
        .with_target(config.logging.with_target)
        .json_format(config.logging.json_format);
    init_logging_with_config(log_config)?;

    if let Some(parent) = config.store.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = Arc::new(ChatStore::open(
        &config.store.db_path.to_string_lossy(),
        config.store.max_pool_size,
        config.store.enable_wal,
    )?);

    let state = Arc::new(AppState::new(store, &config));
    let router = build_router(state);

    let addr = args.listen.unwrap_or(config.server.bind_address);
    let listener = TcpListener::bind(addr).await?;
    info!("Roundtable API listening on {}", addr);

    // Drain connections on shutdown, but never wait longer than the
    // configured grace period
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let mut drain_rx = shutdown_rx.clone();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = drain_rx.wait_for(|stop| *stop).await;
            info!("Shutdown signal received, draining connections");
        })
        .into_future();

    let grace = config.server.shutdown_timeout;
    tokio::select! {
        result = server => result?,
        _ = async {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
            tokio::time::sleep(grace).await;
        } => {
            warn!("Connections still open after {:?}, exiting", grace);
        }
    }

    Ok(())
}
