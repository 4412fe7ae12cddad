//! firecalc server entry point.
//!
//! Boots the rating engine, quote history and offline asset cache, then
//! serves MCP on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use firecalc_client::fetch::{FetchConfig, HttpFetcher};
use firecalc_client::{CacheManager, CacheSettings, spawn_control};
use firecalc_core::{AppConfig, LocalDb, QuoteStore};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let rates = config.rate_table()?;
    tracing::info!(db = %config.db_path.display(), version = %config.cache_version, "starting firecalc server on stdio transport");

    let db = LocalDb::open(&config.db_path).await?;
    let quotes = QuoteStore::load(Arc::new(db.clone())).await?;

    let fetcher = HttpFetcher::new(FetchConfig::from_app_config(&config))?;
    let cache = Arc::new(CacheManager::new(CacheSettings::from_config(&config)?, Arc::new(db), Arc::new(fetcher)));

    let installer = Arc::clone(&cache);
    tokio::spawn(async move {
        if let Err(e) = installer.install().await {
            tracing::warn!(error = %e, "offline cache not installed; requests go to the network");
        }
    });
    let control = spawn_control(Arc::clone(&cache));

    let handler = handler::FireCalcServer::new(rates, quotes, cache, control);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
