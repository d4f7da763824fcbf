//! HTTP server for the tiered cache
//!
//! Provides /health and GET/PUT/DELETE /cache?key=... endpoints.

use crate::types::{HealthResponse, KeyQuery};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use disks3cache::TieredCache;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: TieredCache,
    pub max_body_bytes: usize,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: TieredCache, max_body_bytes: usize) -> Self {
        Self {
            cache,
            max_body_bytes,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/health", get(health))
        .route(
            "/cache",
            get(get_entry).put(put_entry).delete(delete_entry),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server; on shutdown, waits for outstanding tier writes
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(Arc::clone(&state));
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(
        outstanding = state.cache.outstanding_tasks(),
        "Draining cache writes"
    );
    state.cache.flush().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;
    let location = state.cache.location();

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        outstanding_tasks: state.cache.outstanding_tasks(),
        local: state.cache.local_stats().await,
        bucket: location.map(|l| l.bucket.clone()),
        region: location.map(|l| l.region.clone()),
    })
}

async fn get_entry(State(state): State<SharedState>, Query(query): Query<KeyQuery>) -> Response {
    match state.cache.get(&query.key).await {
        Some(value) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            value,
        )
            .into_response(),
        None => {
            debug!(key = %query.key, "Cache miss");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn put_entry(
    State(state): State<SharedState>,
    Query(query): Query<KeyQuery>,
    body: Bytes,
) -> StatusCode {
    state.cache.set(&query.key, body).await;
    StatusCode::ACCEPTED
}

async fn delete_entry(State(state): State<SharedState>, Query(query): Query<KeyQuery>) -> StatusCode {
    state.cache.delete(&query.key).await;
    StatusCode::ACCEPTED
}
