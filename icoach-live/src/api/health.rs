//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WorkerPoolHealth {
    pub capacity: usize,
    pub in_flight: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the store is offline
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    pub uptime_seconds: u64,
    pub worker_pool: WorkerPoolHealth,
    pub active_sessions: usize,
    pub store_online: bool,
    /// Selected provider per capability
    pub providers: BTreeMap<&'static str, &'static str>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let services = &state.services;
    let store_online = services.store.is_online();

    Json(HealthResponse {
        status: if store_online { "ok" } else { "degraded" }.to_string(),
        module: "icoach-live".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        uptime_seconds,
        worker_pool: WorkerPoolHealth {
            capacity: services.pool.capacity(),
            in_flight: services.pool.in_flight(),
        },
        active_sessions: services.registry.active_count().await,
        store_online,
        providers: services.providers.describe().into_iter().collect(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
