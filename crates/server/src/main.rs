// crates/server/src/main.rs
//! Pagefan server binary.
//!
//! Opens the job store, starts the worker pool, then serves HTTP until
//! Ctrl-C. Workers are cancelled and joined after the listener stops.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pagefan_core::{spawn_workers, JobStore, MemoryJobStore, UuidIds};
use pagefan_db::SqliteJobStore;
use pagefan_server::cli::Args;
use pagefan_server::{create_app, init_metrics, Pipeline};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

async fn open_store(args: &Args) -> Result<Arc<dyn JobStore>> {
    match &args.db {
        Some(path) => {
            let store = SqliteJobStore::open(path)
                .await
                .with_context(|| format!("opening job database {}", path.display()))?;
            tracing::info!(path = %path.display(), "Using SQLite job store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Using in-memory job store");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "warn,pagefan_server=info,pagefan_core=info,pagefan_db=info".into()
            }),
        )
        .init();

    let args = Args::parse();
    let config = args.resolve_config().context("loading configuration")?;
    init_metrics();

    let store = open_store(&args).await?;
    let pipeline = Pipeline::new(&config, store, Arc::new(UuidIds));

    let cancel = CancellationToken::new();
    let workers = spawn_workers(
        config.workers,
        pipeline.worker,
        pipeline.consumer,
        cancel.clone(),
    );
    tracing::info!(
        workers = config.workers,
        delay_ms = config.delay_ms,
        randomize_delay = config.randomize_delay,
        "Worker pool started"
    );

    let app = create_app(pipeline.state);
    let addr = args.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    for handle in workers {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Worker task failed");
        }
    }
    Ok(())
}
