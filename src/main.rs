//! kv-shard-cache: sharded async key-value cache server.
//!
//! Serves a string-to-string cache over HTTP. Misses fall through to a
//! directory of JSON documents; writes are persisted write-through or
//! write-back according to the configuration.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use kv_shard_cache::config::{Cli, Config};
use kv_shard_cache::server::{build_router, AppState};
use kv_shard_cache::{CacheBuilder, FileGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "kv_shard_cache=debug,tower_http=debug"
    } else {
        "kv_shard_cache=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("kv-shard-cache v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Arc::new(Config::load(&cli.config)?);

    info!(
        maximum_size = config.cache.maximum_size,
        expiry_secs = config.cache.expiry_secs,
        eviction = %config.cache.eviction_algorithm,
        persist = %config.cache.persist_algorithm,
        pool_size = config.cache.pool_size,
        data_dir = %config.store.data_dir.display(),
        "Configuration loaded"
    );

    // Open the backing store and build the cache.
    let gateway = FileGateway::new(&config.store.data_dir).await?;
    let cache = CacheBuilder::<String, String>::from_config(&config.cache)
        .gateway(gateway)
        .event_stream_capacity(config.server.event_stream_capacity)
        .build()
        .await?;

    let state = Arc::new(AppState {
        cache,
        config: Arc::clone(&config),
        start_time: Instant::now(),
    });

    // Build the HTTP router.
    let app = build_router(state.clone());

    // Start the server.
    let listen_addr = cli.listen.unwrap_or_else(|| config.server.listen.clone());
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Deferred writes must reach the store before exit.
    state.cache.flush().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
