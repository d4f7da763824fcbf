//! Request, response and configuration types for the cache server

use file_blob_cache::CacheStats;
use serde::{Deserialize, Serialize};

/// Configuration for the HTTP front end
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3005,
            max_body_bytes: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// `?key=` query for the cache endpoints
#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub outstanding_tasks: usize,
    pub local: Option<CacheStats>,
    pub bucket: Option<String>,
    pub region: Option<String>,
}
