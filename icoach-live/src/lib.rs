//! icoach-live: live interview coaching sessions
//!
//! Serves the interview WebSocket and the small REST surface around it
//! (health, candidate registration, persisted sessions and reports).

pub mod api;
pub mod audio;
pub mod dialogue;
pub mod error;
pub mod providers;
pub mod scoring;
pub mod session;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use session::SessionServices;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub services: SessionServices,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(services: SessionServices) -> Self {
        Self {
            services,
            startup_time: Utc::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ws_routes())
        .merge(api::candidate_routes())
        .merge(api::session_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
