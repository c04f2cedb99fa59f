//! kvlog Server Binary
//!
//! Replays the transaction log, then serves the HTTP API.

use std::sync::Arc;

use clap::Parser;
use kvlog::config::SyncStrategy;
use kvlog::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// kvlog Server
#[derive(Parser, Debug)]
#[command(name = "kvlog-server")]
#[command(about = "In-memory key-value store with a durable transaction log")]
#[command(version)]
struct Args {
    /// Transaction log file
    #[arg(short = 'f', long, default_value = "transactions.log")]
    log_path: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Pending-event queue capacity; writers block once it is full
    #[arg(short, long, default_value = "16")]
    queue_capacity: usize,

    /// fsync the log every N records (1 = every record)
    #[arg(short, long, default_value = "100")]
    sync_every: usize,
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvlog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("kvlog Server v{}", kvlog::VERSION);
    tracing::info!("Transaction log: {}", args.log_path);
    tracing::info!("Listen address: {}", args.listen);

    let sync_strategy = match args.sync_every {
        1 => SyncStrategy::EveryWrite,
        count => SyncStrategy::EveryNEntries { count },
    };

    // Build config from args
    let config = Config::builder()
        .log_path(&args.log_path)
        .listen_addr(&args.listen)
        .queue_capacity(args.queue_capacity)
        .sync_strategy(sync_strategy)
        .build();

    // Open engine (replays the log)
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };

    let app = kvlog::http::router(Arc::clone(&engine));
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    // Flush the log before exiting
    if let Err(e) = engine.close() {
        tracing::error!("Failed to close transaction log: {}", e);
        std::process::exit(1);
    }

    tracing::info!(last_sequence = engine.last_sequence(), "Server stopped");
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, initiating shutdown...");
}
