//! Candidate registration

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use icoach_common::models::{Candidate, NewCandidate};
use serde::Serialize;
use tracing::info;

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct CandidateCreated {
    pub candidate_id: String,
}

fn validate(candidate: &NewCandidate) -> ApiResult<()> {
    if candidate.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let email = candidate.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest(format!("invalid email: {:?}", candidate.email)));
    }
    if candidate.branch.trim().is_empty() {
        return Err(ApiError::BadRequest("branch is required".to_string()));
    }
    Ok(())
}

/// POST /candidates
pub async fn create_candidate(
    State(state): State<AppState>,
    Json(candidate): Json<NewCandidate>,
) -> ApiResult<(StatusCode, Json<CandidateCreated>)> {
    validate(&candidate)?;
    let candidate_id = state.services.store.save_candidate(&candidate).await?;
    info!(candidate_id = %candidate_id, branch = %candidate.branch, "Candidate registered");
    Ok((StatusCode::CREATED, Json(CandidateCreated { candidate_id })))
}

/// GET /candidates/:id
pub async fn get_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<String>,
) -> ApiResult<Json<Candidate>> {
    state
        .services
        .store
        .get_candidate(&candidate_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("candidate {}", candidate_id)))
}

pub fn candidate_routes() -> Router<AppState> {
    Router::new()
        .route("/candidates", post(create_candidate))
        .route("/candidates/:id", get(get_candidate))
}
