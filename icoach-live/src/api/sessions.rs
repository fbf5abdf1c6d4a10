//! Persisted session views and the offline report

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use icoach_common::models::{SessionRecord, SessionSummary};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::scoring::report::{build_report, SessionReport};
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// GET /sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<SessionSummary>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    Ok(Json(state.services.store.list_sessions(limit).await?))
}

async fn load(state: &AppState, session_id: Uuid) -> ApiResult<SessionRecord> {
    state
        .services
        .store
        .load_session(session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {}", session_id)))
}

/// GET /sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionRecord>> {
    Ok(Json(load(&state, session_id).await?))
}

/// GET /sessions/:id/report
///
/// Similarity scoring runs on the worker pool.
pub async fn session_report(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionReport>> {
    let record = load(&state, session_id).await?;
    let semantic = Arc::clone(&state.services.providers.semantic);
    let report = state
        .services
        .pool
        .run("session_report", move || build_report(&record, semantic.as_ref()))
        .await?;
    Ok(Json(report))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/report", get(session_report))
}
