//! disks3cache server - HTTP front end for the disk + S3 tiered blob cache
//!
//! Serves GET/PUT/DELETE /cache?key=... backed by a local disk tier and an
//! S3 bucket, plus /health.

mod error;
mod server;
mod types;

use crate::error::{Result, ServerError};
use crate::server::{start_server, ServerState, SharedState};
use crate::types::ServerConfig;
use disks3cache::{CacheConfig, TieredCache};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("disks3cache_server=info".parse()?)
        .add_directive("disks3cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting disks3cache server...");

    let server_config = load_server_config();
    let cache_config = CacheConfig::from_env()?;
    if cache_config.bucket_url.is_empty() {
        return Err(ServerError::Config(
            "DISKS3CACHE_BUCKET_URL is required".to_string(),
        ));
    }

    info!("Port: {}", server_config.port);
    info!("Bucket URL: {}", cache_config.bucket_url);
    info!(
        "Max local cache size: {} MB",
        cache_config.local_capacity_bytes / (1024 * 1024)
    );
    info!(
        max_outstanding = cache_config.max_outstanding_tasks,
        overflow = %cache_config.overflow,
        "Background dispatch"
    );

    let cache = TieredCache::new(cache_config).await?;
    let state: SharedState = Arc::new(ServerState::new(cache, server_config.max_body_bytes));

    // Start HTTP server (blocking until shutdown)
    start_server(state, server_config.port).await?;

    info!("Shutdown complete");
    Ok(())
}

fn load_server_config() -> ServerConfig {
    let defaults = ServerConfig::default();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(defaults.port);

    let max_body_bytes = std::env::var("DISKS3CACHE_MAX_BODY_BYTES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(defaults.max_body_bytes);

    ServerConfig {
        port,
        max_body_bytes,
    }
}
