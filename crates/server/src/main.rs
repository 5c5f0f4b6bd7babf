//! tiercache server entry point.
//!
//! Loads configuration, opens the cache database, installs and activates
//! the worker, starts the sweeper, then serves MCP on stdio. Logging goes to
//! stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tiercache_client::{FetchClient, FetchConfig, ServiceWorker};
use tiercache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(
        app = %config.app_name,
        version = %config.cache_version,
        db = %config.db_path.display(),
        "starting tiercache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let fetcher = FetchClient::new(FetchConfig::from_app(&config))?;
    let worker = Arc::new(ServiceWorker::new(db, Arc::new(fetcher), &config)?);

    let report = worker.start().await?;
    tracing::info!(
        cached = report.install.cached.len(),
        failed = report.install.failed.len(),
        state = ?worker.state().await,
        "worker ready"
    );

    let handler = handler::TiercacheServer::new(worker.clone());
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    worker.stop();
    Ok(())
}
